//! Read-only aggregation over the shard cache: monthly summaries, the combined
//! view, category totals, and rolling multi-month statistics.
//!
//! Apart from `rolling_average`, which loads its trailing months through the
//! cache, these queries read whatever is already cached and treat an unloaded
//! shard as empty rather than failing.

use crate::ledger::Ledger;
use crate::model::{Amount, MonthShard, ShardKey, Transaction, TransactionKind};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// One month's totals. All zeros when the shard was never loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    pub total_income: Amount,
    pub total_expenses: Amount,
    pub balance: Amount,
    pub income_count: usize,
    pub expense_count: usize,
}

/// A transaction tagged with which sequence it came from, for views that merge
/// income and expenses.
#[derive(Debug, Clone, Serialize)]
pub struct CombinedEntry {
    #[serde(flatten)]
    pub transaction: Transaction,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
}

/// Averages over a trailing window of months.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingAverage {
    pub months_requested: u32,
    /// How many of the requested months actually loaded; the divisor.
    pub months_loaded: u32,
    pub average_income: Amount,
    pub average_expenses: Amount,
    pub average_balance: Amount,
    /// Approximate daily spend: average expenses over a 30-day month.
    pub daily_burn_rate: Amount,
}

/// One category's share of a month, for the grouped expense/income breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: String,
    pub total: Amount,
    pub count: usize,
}

impl Ledger {
    /// Totals for one month. An unloaded shard is "nothing here yet", not an
    /// error.
    pub async fn summary(&self, key: ShardKey) -> MonthSummary {
        let state = self.state.lock().await;
        match state.shards.get(&key) {
            Some(shard) if shard.is_loaded() => summarize(shard),
            _ => MonthSummary::default(),
        }
    }

    /// Both sequences merged, each entry tagged with its kind, sorted by date
    /// descending. Empty when the shard was never loaded.
    pub async fn combined_view(&self, key: ShardKey) -> Vec<CombinedEntry> {
        let state = self.state.lock().await;
        let Some(shard) = state.shards.get(&key).filter(|s| s.is_loaded()) else {
            return Vec::new();
        };
        let mut entries: Vec<CombinedEntry> = shard
            .transactions(TransactionKind::Income)
            .iter()
            .map(|t| CombinedEntry {
                transaction: t.clone(),
                kind: TransactionKind::Income,
            })
            .chain(
                shard
                    .transactions(TransactionKind::Expense)
                    .iter()
                    .map(|t| CombinedEntry {
                        transaction: t.clone(),
                        kind: TransactionKind::Expense,
                    }),
            )
            .collect();
        entries.sort_by(|a, b| b.transaction.date().cmp(&a.transaction.date()));
        entries
    }

    /// One month's transactions of one kind grouped by category, sorted by
    /// total descending. Transactions without a category group under
    /// "Uncategorized".
    pub async fn category_totals(&self, key: ShardKey, kind: TransactionKind) -> Vec<CategoryTotal> {
        let state = self.state.lock().await;
        let Some(shard) = state.shards.get(&key).filter(|s| s.is_loaded()) else {
            return Vec::new();
        };
        let mut groups: HashMap<&str, (Amount, usize)> = HashMap::new();
        for t in shard.transactions(kind) {
            let entry = groups
                .entry(t.category().unwrap_or("Uncategorized"))
                .or_default();
            entry.0 += t.amount();
            entry.1 += 1;
        }
        let mut totals: Vec<CategoryTotal> = groups
            .into_iter()
            .map(|(category, (total, count))| CategoryTotal {
                category: category.to_string(),
                total,
                count,
            })
            .collect();
        totals.sort_by(|a, b| b.total.cmp(&a.total));
        totals
    }

    /// Averages over the `months` calendar months ending at `end` inclusive.
    ///
    /// Each month loads independently through the cache; a month that fails to
    /// load is skipped rather than aborting the whole calculation, and the
    /// divisor is the count of months actually obtained, never `months`.
    pub async fn rolling_average(&self, end: ShardKey, months: u32) -> RollingAverage {
        let mut total_income = Amount::ZERO;
        let mut total_expenses = Amount::ZERO;
        let mut loaded = 0u32;
        let mut key = end;
        for _ in 0..months {
            match self.get_shard(key).await {
                Ok(shard) => {
                    total_income += shard
                        .transactions(TransactionKind::Income)
                        .iter()
                        .map(Transaction::amount)
                        .sum();
                    total_expenses += shard
                        .transactions(TransactionKind::Expense)
                        .iter()
                        .map(Transaction::amount)
                        .sum();
                    loaded += 1;
                }
                Err(e) => debug!("skipping {key} in the rolling window: {e}"),
            }
            key = key.pred();
        }
        if loaded == 0 {
            return RollingAverage {
                months_requested: months,
                ..RollingAverage::default()
            };
        }
        let divisor = Decimal::from(loaded);
        let average_income = Amount::new(total_income.value() / divisor);
        let average_expenses = Amount::new(total_expenses.value() / divisor);
        RollingAverage {
            months_requested: months,
            months_loaded: loaded,
            average_income,
            average_expenses,
            average_balance: average_income - average_expenses,
            daily_burn_rate: Amount::new(average_expenses.value() / Decimal::from(30)),
        }
    }
}

/// Relative change from `old` to `new`, in percent.
///
/// Both zero means no change at all, so zero. A nonzero value appearing from
/// zero has no defined relative change, so `None`.
pub fn percentage_change(old: Amount, new: Amount) -> Option<Decimal> {
    if old.is_zero() {
        return new.is_zero().then_some(Decimal::ZERO);
    }
    Some((new.value() - old.value()) / old.value() * Decimal::from(100))
}

fn summarize(shard: &MonthShard) -> MonthSummary {
    let income = shard.transactions(TransactionKind::Income);
    let expenses = shard.transactions(TransactionKind::Expense);
    let total_income: Amount = income.iter().map(Transaction::amount).sum();
    let total_expenses: Amount = expenses.iter().map(Transaction::amount).sum();
    MonthSummary {
        total_income,
        total_expenses,
        balance: total_income - total_expenses,
        income_count: income.len(),
        expense_count: expenses.len(),
    }
}
