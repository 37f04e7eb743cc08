use crate::model::{Amount, ShardKey};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Whether a transaction is money in or money out. Determines which of a
/// shard's two files the transaction lives in.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    #[default]
    Expense,
}

serde_plain::derive_display_from_serialize!(TransactionKind);
serde_plain::derive_fromstr_from_deserialize!(TransactionKind);

impl TransactionKind {
    /// The file stem within a shard directory: `income.json` or `expenses.json`.
    pub fn file_name(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expenses",
        }
    }

    /// The prefix used when generating transaction ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            TransactionKind::Income => "inc",
            TransactionKind::Expense => "exp",
        }
    }
}

/// A single ledger entry as stored in a shard file.
///
/// `id` is assigned at creation and immutable afterwards. The central
/// consistency rule is that `date` always belongs to the (year, month) shard
/// the transaction is stored under; the operations layer enforces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub(crate) id: String,
    pub(crate) date: NaiveDate,
    pub(crate) description: String,
    pub(crate) amount: Amount,
    /// Optional; omitted from the serialized form entirely when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) category: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// A transaction as proposed by the caller, before validation and before the
/// server-assigned fields (id, timestamps) exist.
#[derive(Debug, Clone, Default)]
pub struct NewTransaction {
    pub date: String,
    pub description: String,
    pub amount: Amount,
    pub category: Option<String>,
}

/// A partial update to an existing transaction. `None` fields are left
/// unchanged. An empty `category` string clears the category.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub date: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Amount>,
    pub category: Option<String>,
}

impl TransactionPatch {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.description.is_none()
            && self.amount.is_none()
            && self.category.is_none()
    }
}

/// Generates a transaction id: `{inc|exp}_{year}{month}{millis}{random}`.
///
/// Unique within practical probability; the random suffix disambiguates ids
/// generated within the same millisecond.
pub(crate) fn generate_id(kind: TransactionKind, key: ShardKey) -> String {
    let millis = Utc::now().timestamp_millis();
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}_{:04}{:02}{}{}",
        kind.id_prefix(),
        key.year(),
        key.month(),
        millis,
        &uuid[..4]
    )
}

/// Recovers the (year, month) embedded in a generated id, for loading the
/// shard a transaction most likely lives in before searching for it. Returns
/// `None` for ids that do not carry a plausible year and month.
pub(crate) fn id_shard_hint(id: &str) -> Option<ShardKey> {
    let (_, rest) = id.split_once('_')?;
    if rest.len() < 6 || !rest[..6].bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = rest[..4].parse().ok()?;
    let month: u32 = rest[4..6].parse().ok()?;
    (1..=12).contains(&month).then_some(ShardKey::new(year, month))
}
