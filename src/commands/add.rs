use crate::api::Mode;
use crate::args::AddArgs;
use crate::commands::{open_ledger, Out};
use crate::model::{NewTransaction, Transaction};
use crate::{Config, Result};

/// Handles the `ledgerly add` command.
///
/// Validates the input, stores the transaction in the month file its date
/// belongs to, and reports the generated id.
pub async fn add(config: Config, mode: Mode, args: &AddArgs) -> Result<Out<Transaction>> {
    let ledger = open_ledger(&config, mode).await?;
    let new = NewTransaction {
        date: args.date().to_string(),
        description: args.description().to_string(),
        amount: args.amount(),
        category: args.category().map(String::from),
    };
    let transaction = ledger.add(new, args.kind()).await?;
    Ok(Out::new(
        format!(
            "Added {} {}: {} ({}) on {}",
            args.kind(),
            transaction.id(),
            transaction.description(),
            transaction.amount(),
            transaction.date(),
        ),
        transaction,
    ))
}
