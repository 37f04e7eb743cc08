use crate::api::Mode;
use crate::args::UpdateArgs;
use crate::commands::{open_ledger, Out};
use crate::model::{id_shard_hint, Transaction, TransactionPatch};
use crate::{Config, Error, Result};

/// Handles the `ledgerly update` command.
///
/// Loads the month embedded in the id, applies the given fields, and reports
/// the result. Changing the date to a different month moves the transaction
/// between month files.
pub async fn update(config: Config, mode: Mode, args: &UpdateArgs) -> Result<Out<Transaction>> {
    let patch = TransactionPatch {
        date: args.date().map(String::from),
        description: args.description().map(String::from),
        amount: args.amount(),
        category: args.category().map(String::from),
    };
    if patch.is_empty() {
        return Err(Error::validation("update", "no fields to update were given"));
    }

    let ledger = open_ledger(&config, mode).await?;
    if let Some(key) = id_shard_hint(args.id()) {
        ledger.ensure_loaded(key).await?;
    }
    let transaction = ledger.update(args.id(), patch).await?;
    Ok(Out::new(
        format!(
            "Updated {}: {} ({}) on {}",
            transaction.id(),
            transaction.description(),
            transaction.amount(),
            transaction.date(),
        ),
        transaction,
    ))
}
