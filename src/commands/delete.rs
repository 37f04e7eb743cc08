use crate::api::Mode;
use crate::args::DeleteArgs;
use crate::commands::{open_ledger, Out};
use crate::model::{id_shard_hint, Transaction};
use crate::{Config, Result};

/// Handles the `ledgerly delete` command.
///
/// Loads the month embedded in the id, removes the transaction, and rewrites
/// that month's file without it.
pub async fn delete(config: Config, mode: Mode, args: &DeleteArgs) -> Result<Out<Transaction>> {
    let ledger = open_ledger(&config, mode).await?;
    if let Some(key) = id_shard_hint(args.id()) {
        ledger.ensure_loaded(key).await?;
    }
    let transaction = ledger.delete(args.id()).await?;
    Ok(Out::new(
        format!(
            "Deleted {}: {} ({})",
            transaction.id(),
            transaction.description(),
            transaction.amount(),
        ),
        transaction,
    ))
}
