use crate::api::Mode;
use crate::commands::{open_ledger, Out};
use crate::model::{CategoryIndex, TransactionKind};
use crate::{Config, Result};

/// Handles the `ledgerly category add` command.
///
/// Adds a name to the income or expense category list and rewrites the index
/// file.
pub async fn category_add(
    config: Config,
    mode: Mode,
    kind: TransactionKind,
    name: &str,
) -> Result<Out<()>> {
    let ledger = open_ledger(&config, mode).await?;
    let added = ledger.add_category(name, kind).await?;
    Ok(format!("Added {kind} category '{added}'").into())
}

/// Handles the `ledgerly category list` command.
pub async fn category_list(config: Config, mode: Mode) -> Result<Out<CategoryIndex>> {
    let ledger = open_ledger(&config, mode).await?;
    let index = ledger.categories().await?;
    let message = format!(
        "income: {}\nexpenses: {}",
        join_or_none(index.names(TransactionKind::Income)),
        join_or_none(index.names(TransactionKind::Expense)),
    );
    Ok(Out::new(message, index))
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}
