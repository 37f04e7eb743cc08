//! Transaction operations: validate, add, find, update, delete, and the
//! category operations.
//!
//! Every mutation follows the same shape: mutate the in-memory shard under the
//! state lock, serialize the whole affected sequence, release the lock, then
//! issue the remote write(s). The in-memory change for transactions is not
//! rolled back when the write fails (see DESIGN.md); a caller can `invalidate`
//! and reload to resynchronize.

use crate::ledger::Ledger;
use crate::model::{
    category_path, generate_id, parse_date, Amount, CategoryIndex, NewTransaction, ShardKey,
    Transaction, TransactionKind, TransactionPatch,
};
use crate::{Error, Result};
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use tracing::debug;

/// The result of locating a transaction by id: the transaction itself plus
/// where it lives.
#[derive(Debug, Clone)]
pub struct FoundTransaction {
    pub transaction: Transaction,
    pub kind: TransactionKind,
    pub key: ShardKey,
    pub index: usize,
}

impl Ledger {
    /// Validates, persists, and returns a new transaction.
    ///
    /// The target shard is resolved from the transaction's date, the shard is
    /// loaded if needed, the transaction is appended and the sequence
    /// re-sorted (date descending, stable), and the whole updated sequence is
    /// written as one file replacement.
    pub async fn add(&self, new: NewTransaction, kind: TransactionKind) -> Result<Transaction> {
        let key = ShardKey::from_date(&new.date)?;
        let date = validate(&new.date, &new.description, new.amount, key)?;
        self.ensure_loaded(key).await?;

        let now = Utc::now();
        let transaction = Transaction {
            id: generate_id(kind, key),
            date,
            description: new.description.trim().to_string(),
            amount: new.amount,
            category: normalize_category(new.category),
            created_at: now,
            updated_at: now,
        };

        let content = {
            let mut state = self.state.lock().await;
            let shard = state
                .shards
                .get_mut(&key)
                .with_context(|| format!("shard {key} disappeared from the cache"))?;
            shard.transactions_mut(kind).push(transaction.clone());
            shard.sort(kind);
            serialize_sequence(shard.transactions(kind))?
        };

        let message = format!(
            "Add {kind}: {} ({})",
            transaction.description, transaction.amount
        );
        let path = key.file_path(&self.base_path, kind);
        self.files.save(&path, &content, &message).await?;
        debug!("added {} to {key}", transaction.id);
        Ok(transaction)
    }

    /// Locates a transaction by id with a linear scan over all loaded shards,
    /// income before expenses within each shard. Shards that were never
    /// loaded are not searched.
    pub async fn find(&self, id: &str) -> Result<FoundTransaction> {
        let state = self.state.lock().await;
        for (key, shard) in &state.shards {
            if !shard.is_loaded() {
                continue;
            }
            for kind in [TransactionKind::Income, TransactionKind::Expense] {
                if let Some(index) = shard.transactions(kind).iter().position(|t| t.id == id) {
                    return Ok(FoundTransaction {
                        transaction: shard.transactions(kind)[index].clone(),
                        kind,
                        key: *key,
                        index,
                    });
                }
            }
        }
        Err(Error::not_found(id))
    }

    /// Applies a partial update. When the effective date moves the transaction
    /// to a different month, the move protocol runs: the old shard's file is
    /// written without the item and the destination shard's file with it, as
    /// two concurrent writes with no joint atomicity.
    pub async fn update(&self, id: &str, patch: TransactionPatch) -> Result<Transaction> {
        let found = self.find(id).await?;
        let current = &found.transaction;

        let new_date = match &patch.date {
            Some(date) => date.clone(),
            None => current.date.to_string(),
        };
        let new_key = ShardKey::from_date(&new_date)?;

        let mut updated = current.clone();
        updated.date = parse_date(&new_date)?;
        if let Some(description) = &patch.description {
            // An all-whitespace update keeps the existing description.
            if !description.trim().is_empty() {
                updated.description = description.trim().to_string();
            }
        }
        if let Some(amount) = patch.amount {
            updated.amount = amount;
        }
        if let Some(category) = patch.category {
            // An empty string clears the category.
            updated.category = normalize_category(Some(category));
        }
        updated.updated_at = Utc::now();

        validate(&new_date, &updated.description, updated.amount, new_key)?;

        if new_key != found.key {
            self.move_across_shards(found, updated, new_key).await
        } else {
            self.update_in_place(found, updated).await
        }
    }

    /// Removes a transaction and writes the reduced sequence.
    pub async fn delete(&self, id: &str) -> Result<Transaction> {
        let found = self.find(id).await?;
        let content = {
            let mut state = self.state.lock().await;
            let shard = state
                .shards
                .get_mut(&found.key)
                .with_context(|| format!("shard {} disappeared from the cache", found.key))?;
            shard
                .transactions_mut(found.kind)
                .retain(|t| t.id != found.transaction.id);
            serialize_sequence(shard.transactions(found.kind))?
        };
        let message = format!(
            "Delete {}: {} ({})",
            found.kind, found.transaction.description, found.transaction.amount
        );
        let path = found.key.file_path(&self.base_path, found.kind);
        self.files.save(&path, &content, &message).await?;
        debug!("deleted {} from {}", found.transaction.id, found.key);
        Ok(found.transaction)
    }

    /// The category index, loaded from the remote store on first use. A
    /// missing file is the empty index.
    pub async fn categories(&self) -> Result<CategoryIndex> {
        {
            let state = self.state.lock().await;
            if let Some(index) = &state.categories {
                return Ok(index.clone());
            }
        }
        let path = category_path(&self.base_path);
        let file = self.files.read(&path).await?;
        let index = if file.exists && !file.content.trim().is_empty() {
            serde_json::from_str(&file.content)
                .with_context(|| format!("Failed to parse the category index at {path}"))?
        } else {
            CategoryIndex::default()
        };
        let mut state = self.state.lock().await;
        state.categories = Some(index.clone());
        Ok(index)
    }

    /// Adds a category and writes the whole index file. Unlike transaction
    /// mutations, a failed write rolls the in-memory append back.
    pub async fn add_category(&self, name: &str, kind: TransactionKind) -> Result<String> {
        let mut index = self.categories().await?;
        let added = index.add(name, kind)?;
        {
            let mut state = self.state.lock().await;
            state.categories = Some(index.clone());
        }

        let content =
            serde_json::to_string_pretty(&index).context("Unable to serialize the category index")?;
        let message = format!("Add new {kind} category: {added}");
        let path = category_path(&self.base_path);
        if let Err(e) = self.files.save(&path, &content, &message).await {
            let mut state = self.state.lock().await;
            if let Some(index) = &mut state.categories {
                index.remove(&added, kind);
            }
            return Err(e);
        }
        Ok(added)
    }

    async fn update_in_place(
        &self,
        found: FoundTransaction,
        updated: Transaction,
    ) -> Result<Transaction> {
        let content = {
            let mut state = self.state.lock().await;
            let shard = state
                .shards
                .get_mut(&found.key)
                .with_context(|| format!("shard {} disappeared from the cache", found.key))?;
            let sequence = shard.transactions_mut(found.kind);
            let index = sequence
                .iter()
                .position(|t| t.id == updated.id)
                .ok_or_else(|| Error::not_found(updated.id.as_str()))?;
            sequence[index] = updated.clone();
            shard.sort(found.kind);
            serialize_sequence(shard.transactions(found.kind))?
        };
        let message = format!("Update {}: {}", found.kind, updated.description);
        let path = found.key.file_path(&self.base_path, found.kind);
        self.files.save(&path, &content, &message).await?;
        Ok(updated)
    }

    /// The move protocol: remove from the old shard, load the destination,
    /// insert there, then write both files concurrently. A failure of one
    /// write after the other succeeds leaves the transaction duplicated or
    /// absent across the two shards (an accepted limitation of the underlying
    /// store).
    async fn move_across_shards(
        &self,
        found: FoundTransaction,
        updated: Transaction,
        new_key: ShardKey,
    ) -> Result<Transaction> {
        let old_content = {
            let mut state = self.state.lock().await;
            let shard = state
                .shards
                .get_mut(&found.key)
                .with_context(|| format!("shard {} disappeared from the cache", found.key))?;
            shard
                .transactions_mut(found.kind)
                .retain(|t| t.id != updated.id);
            serialize_sequence(shard.transactions(found.kind))?
        };

        self.ensure_loaded(new_key).await?;

        let new_content = {
            let mut state = self.state.lock().await;
            let shard = state
                .shards
                .get_mut(&new_key)
                .with_context(|| format!("shard {new_key} disappeared from the cache"))?;
            shard.transactions_mut(found.kind).push(updated.clone());
            shard.sort(found.kind);
            serialize_sequence(shard.transactions(found.kind))?
        };

        let old_path = found.key.file_path(&self.base_path, found.kind);
        let new_path = new_key.file_path(&self.base_path, found.kind);
        let remove_message = format!("Move {} transaction to {new_key}", found.kind);
        let add_message = format!("Move {} transaction from {}", found.kind, found.key);
        tokio::try_join!(
            self.files.save(&old_path, &old_content, &remove_message),
            self.files.save(&new_path, &new_content, &add_message),
        )?;
        debug!("moved {} from {} to {new_key}", updated.id, found.key);
        Ok(updated)
    }
}

/// The validation gate every create and update passes before any I/O.
///
/// Checks, in order: date present and well-formed, description non-empty,
/// amount strictly positive, and the date's computed shard equal to the
/// target shard the caller resolved. Each failure names the offending field.
fn validate(
    date: &str,
    description: &str,
    amount: Amount,
    target: ShardKey,
) -> Result<NaiveDate> {
    if date.trim().is_empty() {
        return Err(Error::validation("date", "a date is required"));
    }
    let parsed = parse_date(date)?;
    if description.trim().is_empty() {
        return Err(Error::validation("description", "a description is required"));
    }
    if !amount.is_positive() {
        return Err(Error::validation(
            "amount",
            format!("'{amount}' is not a positive amount"),
        ));
    }
    let computed = ShardKey::of(parsed);
    if computed != target {
        return Err(Error::validation(
            "date",
            format!("'{date}' belongs to {computed}, not to the target month {target}"),
        ));
    }
    Ok(parsed)
}

fn normalize_category(category: Option<String>) -> Option<String> {
    category.and_then(|c| {
        let trimmed = c.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}

fn serialize_sequence(transactions: &[Transaction]) -> Result<String> {
    let content = serde_json::to_string_pretty(transactions)
        .context("Unable to serialize the transaction sequence")?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RemoteStore;
    use crate::test::TestLedger;
    use std::str::FromStr;

    fn new_expense(date: &str, description: &str, amount: &str) -> NewTransaction {
        NewTransaction {
            date: date.to_string(),
            description: description.to_string(),
            amount: Amount::from_str(amount).unwrap(),
            category: None,
        }
    }

    #[tokio::test]
    async fn test_add_stores_under_the_date_shard() {
        let fixture = TestLedger::empty();
        let added = fixture
            .ledger
            .add(new_expense("2024-04-15", "Lunch", "14.85"), TransactionKind::Expense)
            .await
            .unwrap();
        assert!(added.id().starts_with("exp_202404"));
        assert_eq!(ShardKey::of(added.date()), ShardKey::new(2024, 4));

        let shard = fixture.ledger.get_shard(ShardKey::new(2024, 4)).await.unwrap();
        assert_eq!(shard.transactions(TransactionKind::Expense).len(), 1);

        // The whole sequence was rewritten remotely.
        let file = fixture.store.read("data/2024/04/expenses.json").await.unwrap();
        let stored: Vec<Transaction> = serde_json::from_str(&file.content).unwrap();
        assert_eq!(stored[0].description(), "Lunch");
    }

    #[tokio::test]
    async fn test_add_then_find_returns_equal_transaction() {
        let fixture = TestLedger::empty();
        let mut new = new_expense("2024-04-15", "  Lunch  ", "14.85");
        new.category = Some("Food".to_string());
        let added = fixture
            .ledger
            .add(new, TransactionKind::Expense)
            .await
            .unwrap();

        let found = fixture.ledger.find(added.id()).await.unwrap();
        assert_eq!(found.transaction, added);
        assert_eq!(found.kind, TransactionKind::Expense);
        assert_eq!(found.key, ShardKey::new(2024, 4));
        assert_eq!(found.transaction.description(), "Lunch");
        assert_eq!(found.transaction.category(), Some("Food"));
    }

    #[tokio::test]
    async fn test_validation_failures_name_the_field() {
        let fixture = TestLedger::empty();
        let cases: Vec<(NewTransaction, &str)> = vec![
            (new_expense("", "Lunch", "10"), "date"),
            (new_expense("15-04-2024", "Lunch", "10"), "date"),
            (new_expense("2024-04-15", "   ", "10"), "description"),
            (new_expense("2024-04-15", "Lunch", "0"), "amount"),
            (new_expense("2024-04-15", "Lunch", "-5"), "amount"),
        ];
        for (new, expected_field) in cases {
            let err = fixture
                .ledger
                .add(new, TransactionKind::Expense)
                .await
                .unwrap_err();
            match err {
                Error::Validation { field, .. } => assert_eq!(field, expected_field),
                other => panic!("expected a validation error, got {other:?}"),
            }
        }
        // Nothing was written.
        assert!(!fixture.store.exists("data/2024/04/expenses.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_validate_rejects_wrong_target_shard() {
        let err = validate(
            "2024-05-01",
            "Lunch",
            Amount::from_str("10").unwrap(),
            ShardKey::new(2024, 4),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "date", .. }));
    }

    #[tokio::test]
    async fn test_sequences_stay_sorted_date_descending() {
        let fixture = TestLedger::empty();
        for date in ["2024-01-05", "2024-01-20", "2024-01-01"] {
            fixture
                .ledger
                .add(new_expense(date, "x", "1"), TransactionKind::Expense)
                .await
                .unwrap();
        }
        let shard = fixture.ledger.get_shard(ShardKey::new(2024, 1)).await.unwrap();
        let dates: Vec<String> = shard
            .transactions(TransactionKind::Expense)
            .iter()
            .map(|t| t.date().to_string())
            .collect();
        assert_eq!(dates, ["2024-01-20", "2024-01-05", "2024-01-01"]);
    }

    #[tokio::test]
    async fn test_update_in_place() {
        let fixture = TestLedger::empty();
        let added = fixture
            .ledger
            .add(new_expense("2024-04-15", "Lunch", "14.85"), TransactionKind::Expense)
            .await
            .unwrap();

        let patch = TransactionPatch {
            amount: Some(Amount::from_str("16.00").unwrap()),
            description: Some("Team lunch".to_string()),
            ..Default::default()
        };
        let updated = fixture.ledger.update(added.id(), patch).await.unwrap();
        assert_eq!(updated.description(), "Team lunch");
        assert_eq!(updated.amount(), Amount::from_str("16.00").unwrap());
        assert_eq!(updated.id(), added.id());
        assert_eq!(updated.created_at(), added.created_at());
        assert!(updated.updated_at() >= added.updated_at());

        let found = fixture.ledger.find(added.id()).await.unwrap();
        assert_eq!(found.transaction.description(), "Team lunch");
    }

    #[tokio::test]
    async fn test_update_clears_category_with_empty_string() {
        let fixture = TestLedger::empty();
        let mut new = new_expense("2024-04-15", "Lunch", "14.85");
        new.category = Some("Food".to_string());
        let added = fixture.ledger.add(new, TransactionKind::Expense).await.unwrap();

        let patch = TransactionPatch {
            category: Some(String::new()),
            ..Default::default()
        };
        let updated = fixture.ledger.update(added.id(), patch).await.unwrap();
        assert_eq!(updated.category(), None);

        // The serialized form omits the field entirely.
        let file = fixture.store.read("data/2024/04/expenses.json").await.unwrap();
        assert!(!file.content.contains("category"));
    }

    #[tokio::test]
    async fn test_update_moving_date_runs_the_move_protocol() {
        let fixture = TestLedger::empty();
        let added = fixture
            .ledger
            .add(new_expense("2024-04-15", "Lunch", "14.85"), TransactionKind::Expense)
            .await
            .unwrap();

        let patch = TransactionPatch {
            date: Some("2024-05-02".to_string()),
            ..Default::default()
        };
        let updated = fixture.ledger.update(added.id(), patch).await.unwrap();
        assert_eq!(ShardKey::of(updated.date()), ShardKey::new(2024, 5));

        // Absent from the old shard, present in the new one.
        let old = fixture.ledger.get_shard(ShardKey::new(2024, 4)).await.unwrap();
        assert!(old.transactions(TransactionKind::Expense).is_empty());
        let new = fixture.ledger.get_shard(ShardKey::new(2024, 5)).await.unwrap();
        assert_eq!(new.transactions(TransactionKind::Expense).len(), 1);

        // Both remote files were rewritten.
        let old_file = fixture.store.read("data/2024/04/expenses.json").await.unwrap();
        assert_eq!(old_file.content.trim(), "[]");
        let new_file = fixture.store.read("data/2024/05/expenses.json").await.unwrap();
        assert!(new_file.content.contains(added.id()));
    }

    #[tokio::test]
    async fn test_delete_then_find_is_not_found() {
        let fixture = TestLedger::empty();
        let added = fixture
            .ledger
            .add(new_expense("2024-04-15", "Lunch", "14.85"), TransactionKind::Expense)
            .await
            .unwrap();

        fixture.ledger.delete(added.id()).await.unwrap();
        let err = fixture.ledger.find(added.id()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        let file = fixture.store.read("data/2024/04/expenses.json").await.unwrap();
        assert_eq!(file.content.trim(), "[]");
    }

    #[tokio::test]
    async fn test_find_does_not_search_unloaded_shards() {
        let fixture = TestLedger::seeded();
        // The seed store has a transaction in 2025/07, but the shard has not
        // been loaded into this ledger.
        let err = fixture
            .ledger
            .find("exp_2025071752054000003c4d")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        fixture.ledger.load_shard(ShardKey::new(2025, 7)).await.unwrap();
        fixture.ledger.find("exp_2025071752054000003c4d").await.unwrap();
    }

    #[tokio::test]
    async fn test_categories_default_when_file_missing() {
        let fixture = TestLedger::empty();
        let index = fixture.ledger.categories().await.unwrap();
        assert!(index.names(TransactionKind::Income).is_empty());
        assert!(index.names(TransactionKind::Expense).is_empty());
    }

    #[tokio::test]
    async fn test_add_category_persists_sorted() {
        let fixture = TestLedger::seeded();
        fixture
            .ledger
            .add_category("Auto", TransactionKind::Expense)
            .await
            .unwrap();
        let index = fixture.ledger.categories().await.unwrap();
        assert_eq!(
            index.names(TransactionKind::Expense),
            &["Auto".to_string(), "Groceries".to_string(), "Housing".to_string()]
        );
        let file = fixture.store.read("data/category.json").await.unwrap();
        assert!(file.content.contains("Auto"));
    }

    #[tokio::test]
    async fn test_add_category_rejects_duplicate() {
        let fixture = TestLedger::seeded();
        let err = fixture
            .ledger
            .add_category("groceries", TransactionKind::Expense)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "category", .. }));
    }
}
