//! The month shard: the (year, month) partition holding one month's income and
//! expense sequences, and the pure mapping from calendar dates to storage paths.

use crate::model::{Transaction, TransactionKind};
use crate::{Error, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};

/// Identifies a month shard. Files for a shard live at
/// `{base}/{year}/{month}/income.json` and `{base}/{year}/{month}/expenses.json`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ShardKey {
    year: i32,
    month: u32,
}

impl ShardKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// The shard a calendar date belongs to.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parses a `YYYY-MM-DD` string and returns the shard it belongs to.
    pub fn from_date(date: &str) -> Result<Self> {
        Ok(Self::of(parse_date(date)?))
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The path of one of this shard's two files.
    pub fn file_path(&self, base: &str, kind: TransactionKind) -> String {
        format!(
            "{base}/{:04}/{:02}/{}.json",
            self.year,
            self.month,
            kind.file_name()
        )
    }

    /// The previous calendar month.
    pub fn pred(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }
}

impl Display for ShardKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}/{:02}", self.year, self.month)
    }
}

/// The path of the category index file, which is independent of month shards.
pub fn category_path(base: &str) -> String {
    format!("{base}/category.json")
}

/// Parses a strict `YYYY-MM-DD` date string.
///
/// Rejects anything that does not match the zero-padded pattern, then lets
/// chrono reject impossible calendar dates such as `2024-02-31`.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let bytes = s.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shaped {
        return Err(Error::validation(
            "date",
            format!("'{s}' does not match the YYYY-MM-DD pattern"),
        ));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| Error::validation("date", format!("'{s}' is not a valid calendar date")))
}

/// One month's working set: both sequences plus the loaded flag.
///
/// Owned exclusively by the ledger cache and mutated only through the
/// transaction operations. A shard is never partially loaded; both files are
/// fetched together and `loaded` flips once.
#[derive(Debug, Clone, Serialize)]
pub struct MonthShard {
    pub(crate) key: ShardKey,
    pub(crate) income: Vec<Transaction>,
    pub(crate) expenses: Vec<Transaction>,
    pub(crate) loaded: bool,
}

impl MonthShard {
    pub(crate) fn new(key: ShardKey, income: Vec<Transaction>, expenses: Vec<Transaction>) -> Self {
        Self {
            key,
            income,
            expenses,
            loaded: true,
        }
    }

    pub fn key(&self) -> ShardKey {
        self.key
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn transactions(&self, kind: TransactionKind) -> &[Transaction] {
        match kind {
            TransactionKind::Income => &self.income,
            TransactionKind::Expense => &self.expenses,
        }
    }

    pub(crate) fn transactions_mut(&mut self, kind: TransactionKind) -> &mut Vec<Transaction> {
        match kind {
            TransactionKind::Income => &mut self.income,
            TransactionKind::Expense => &mut self.expenses,
        }
    }

    /// Re-sorts one sequence by date descending. `sort_by` is stable, so
    /// same-date transactions keep their relative order.
    pub(crate) fn sort(&mut self, kind: TransactionKind) {
        self.transactions_mut(kind)
            .sort_by(|a, b| b.date().cmp(&a.date()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_key_from_date() {
        let key = ShardKey::from_date("2024-04-15").unwrap();
        assert_eq!(key, ShardKey::new(2024, 4));
        assert_eq!(key.to_string(), "2024/04");
    }

    #[test]
    fn test_parse_date_rejects_bad_patterns() {
        for bad in ["2024-4-15", "04/15/2024", "2024-04-15T00:00:00", "", "2024-13-01", "2024-02-31"] {
            let err = parse_date(bad).unwrap_err();
            assert!(
                matches!(err, Error::Validation { field: "date", .. }),
                "expected a date validation error for '{bad}', got {err:?}"
            );
        }
    }

    #[test]
    fn test_file_paths() {
        let key = ShardKey::new(2024, 4);
        assert_eq!(
            key.file_path("data", TransactionKind::Income),
            "data/2024/04/income.json"
        );
        assert_eq!(
            key.file_path("data", TransactionKind::Expense),
            "data/2024/04/expenses.json"
        );
        assert_eq!(category_path("data"), "data/category.json");
    }

    #[test]
    fn test_pred_crosses_year_boundary() {
        assert_eq!(ShardKey::new(2024, 1).pred(), ShardKey::new(2023, 12));
        assert_eq!(ShardKey::new(2024, 6).pred(), ShardKey::new(2024, 5));
    }
}
