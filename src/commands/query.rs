//! Read-only commands: `list`, `summary`, and `report`.

use crate::api::Mode;
use crate::args::{MonthArgs, ReportArgs};
use crate::commands::{open_ledger, resolve_month, Out};
use crate::ledger::{percentage_change, CombinedEntry, MonthSummary, RollingAverage};
use crate::{Config, Result};
use std::fmt::Write;

/// Handles the `ledgerly list` command.
///
/// Shows one month's income and expense transactions merged, newest first.
pub async fn list(config: Config, mode: Mode, args: &MonthArgs) -> Result<Out<Vec<CombinedEntry>>> {
    let key = resolve_month(args);
    let ledger = open_ledger(&config, mode).await?;
    ledger.ensure_loaded(key).await?;
    let entries = ledger.combined_view(key).await;

    if entries.is_empty() {
        return Ok(Out::new(format!("{key}: no transactions"), entries));
    }
    let mut message = format!("{key}: {} transaction(s)", entries.len());
    for entry in &entries {
        let t = &entry.transaction;
        write!(
            message,
            "\n{}  {:7}  {:>12}  {}",
            t.date(),
            entry.kind.to_string(),
            t.amount().to_string(),
            t.description(),
        )
        .ok();
        if let Some(category) = t.category() {
            write!(message, " [{category}]").ok();
        }
        write!(message, "  {}", t.id()).ok();
    }
    Ok(Out::new(message, entries))
}

/// Handles the `ledgerly summary` command.
///
/// Shows one month's totals and balance, plus the change in spending relative
/// to the previous month when it is defined.
pub async fn summary(config: Config, mode: Mode, args: &MonthArgs) -> Result<Out<MonthSummary>> {
    let key = resolve_month(args);
    let ledger = open_ledger(&config, mode).await?;
    ledger.ensure_loaded(key).await?;
    let current = ledger.summary(key).await;

    let mut message = format!(
        "{key}: income {}, expenses {}, balance {}",
        current.total_income, current.total_expenses, current.balance,
    );
    // Compare spending against the previous month where that is meaningful.
    if ledger.ensure_loaded(key.pred()).await.is_ok() {
        let previous = ledger.summary(key.pred()).await;
        if let Some(change) = percentage_change(previous.total_expenses, current.total_expenses) {
            message.push_str(&format!(
                ", spending {}{}% vs {}",
                if change.is_sign_positive() { "+" } else { "" },
                change.round_dp(1),
                key.pred(),
            ));
        }
    }
    Ok(Out::new(message, current))
}

/// Handles the `ledgerly report` command.
///
/// Shows averages over a trailing window of months ending at the selected
/// month, including the approximate daily burn rate.
pub async fn report(config: Config, mode: Mode, args: &ReportArgs) -> Result<Out<RollingAverage>> {
    let end = resolve_month(args.month());
    let ledger = open_ledger(&config, mode).await?;
    let rolling = ledger.rolling_average(end, args.months()).await;

    let message = format!(
        "Last {} month(s) ending {end} ({} loaded): average income {}, average expenses {}, \
         average balance {}, daily burn rate {}",
        rolling.months_requested,
        rolling.months_loaded,
        rolling.average_income,
        rolling.average_expenses,
        rolling.average_balance,
        rolling.daily_burn_rate.value().round_dp(2),
    );
    Ok(Out::new(message, rolling))
}
