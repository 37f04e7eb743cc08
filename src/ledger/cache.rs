//! Shard loading and the in-flight request registry.
//!
//! Concurrent loads of the same (year, month) are coalesced: the first caller
//! becomes the leader and issues the two remote reads; later callers attach to
//! the pending load through a watch channel and observe the same outcome. The
//! in-flight marker is cleared unconditionally when the leader finishes,
//! success or failure. If the leader future is dropped before finishing, the
//! next waiter clears the dead marker and takes over as the new leader.

use crate::api::RemoteFile;
use crate::ledger::{Ledger, LoadState};
use crate::model::{MonthShard, ShardKey, Transaction, TransactionKind};
use crate::{Error, Result};
use anyhow::Context;
use tokio::sync::watch;
use tracing::{debug, trace};

impl Ledger {
    /// Returns the cached shard when it is loaded, otherwise loads it.
    pub async fn get_shard(&self, key: ShardKey) -> Result<MonthShard> {
        {
            let state = self.state.lock().await;
            if let Some(shard) = state.shards.get(&key) {
                if shard.is_loaded() {
                    return Ok(shard.clone());
                }
            }
        }
        self.load_shard(key).await
    }

    /// Fetches both of a shard's files from the remote store and caches the
    /// result. Both sequences arrive together; the shard is never partially
    /// loaded.
    pub async fn load_shard(&self, key: ShardKey) -> Result<MonthShard> {
        loop {
            let sender = {
                let mut state = self.state.lock().await;
                match state.in_flight.get(&key) {
                    Some(rx) => {
                        trace!("attaching to in-flight load of {key}");
                        let rx = rx.clone();
                        drop(state);
                        match self.follow(key, rx).await? {
                            Some(shard) => return Ok(shard),
                            // The leader went away without reporting; take
                            // over as the new leader.
                            None => continue,
                        }
                    }
                    None => {
                        let (tx, rx) = watch::channel(LoadState::Pending);
                        state.in_flight.insert(key, rx);
                        tx
                    }
                }
            };

            debug!("loading shard {key}");
            let result = self.fetch(key).await;

            let mut state = self.state.lock().await;
            state.in_flight.remove(&key);
            return match result {
                Ok(shard) => {
                    state.shards.insert(key, shard.clone());
                    let _ = sender.send(LoadState::Loaded);
                    Ok(shard)
                }
                Err(e) => {
                    let _ = sender.send(LoadState::Failed(e.to_string()));
                    Err(e)
                }
            };
        }
    }

    /// Clears the in-flight marker and the loaded flag so the next `get_shard`
    /// re-fetches from the remote store. Writes never call this; they keep the
    /// cache current in place.
    pub async fn invalidate(&self, key: ShardKey) {
        let mut state = self.state.lock().await;
        state.in_flight.remove(&key);
        if let Some(shard) = state.shards.get_mut(&key) {
            shard.loaded = false;
        }
    }

    /// Loads the shard if it is not already loaded.
    pub(crate) async fn ensure_loaded(&self, key: ShardKey) -> Result<()> {
        self.get_shard(key).await.map(|_| ())
    }

    /// Waits on a pending load started by another caller and returns its
    /// outcome. Returns `None` when the leader was dropped before reporting
    /// (for example by a caller-side timeout), after clearing the dead
    /// registry entry so the next attempt starts fresh.
    async fn follow(
        &self,
        key: ShardKey,
        mut rx: watch::Receiver<LoadState>,
    ) -> Result<Option<MonthShard>> {
        loop {
            let current = rx.borrow_and_update().clone();
            match current {
                LoadState::Pending => {
                    if rx.changed().await.is_err() {
                        debug!("the in-flight load of {key} was dropped; retrying");
                        let mut state = self.state.lock().await;
                        // Only remove the entry for the dead channel; a newer
                        // load may already have registered under the key.
                        if let Some(current) = state.in_flight.get(&key) {
                            if current.same_channel(&rx) {
                                state.in_flight.remove(&key);
                            }
                        }
                        return Ok(None);
                    }
                }
                LoadState::Loaded => {
                    let state = self.state.lock().await;
                    return state
                        .shards
                        .get(&key)
                        .cloned()
                        .map(Some)
                        .ok_or_else(|| {
                            Error::Remote(format!("the coalesced load of {key} produced no shard"))
                        });
                }
                LoadState::Failed(message) => return Err(Error::Remote(message)),
            }
        }
    }

    async fn fetch(&self, key: ShardKey) -> Result<MonthShard> {
        let income_path = key.file_path(&self.base_path, TransactionKind::Income);
        let expenses_path = key.file_path(&self.base_path, TransactionKind::Expense);
        let (income_file, expenses_file) = tokio::try_join!(
            self.files.read(&income_path),
            self.files.read(&expenses_path)
        )?;
        let income = decode_sequence(&income_file, &income_path)?;
        let expenses = decode_sequence(&expenses_file, &expenses_path)?;
        Ok(MonthShard::new(key, income, expenses))
    }
}

/// An absent file is an empty sequence; present files must parse.
fn decode_sequence(file: &RemoteFile, path: &str) -> Result<Vec<Transaction>> {
    if !file.exists || file.content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let transactions = serde_json::from_str(&file.content)
        .with_context(|| format!("Failed to parse the transaction file at {path}"))?;
    Ok(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestLedger;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_load_shard_reads_both_files() {
        let fixture = TestLedger::seeded();
        let key = ShardKey::new(2025, 7);
        let shard = fixture.ledger.load_shard(key).await.unwrap();
        assert!(shard.is_loaded());
        assert_eq!(shard.transactions(TransactionKind::Income).len(), 1);
        assert_eq!(shard.transactions(TransactionKind::Expense).len(), 2);
        assert_eq!(fixture.store.read_count("data/2025/07/income.json"), 1);
        assert_eq!(fixture.store.read_count("data/2025/07/expenses.json"), 1);
    }

    #[tokio::test]
    async fn test_missing_month_loads_as_empty() {
        let fixture = TestLedger::empty();
        let shard = fixture.ledger.load_shard(ShardKey::new(2031, 1)).await.unwrap();
        assert!(shard.is_loaded());
        assert!(shard.transactions(TransactionKind::Income).is_empty());
        assert!(shard.transactions(TransactionKind::Expense).is_empty());
    }

    /// Delegates to a `TestStore` after a delay, keeping concurrent loads in
    /// flight long enough for followers to attach.
    struct SlowStore(Arc<crate::api::TestStore>);

    #[async_trait::async_trait]
    impl crate::api::RemoteStore for SlowStore {
        async fn read(&self, path: &str) -> Result<RemoteFile> {
            tokio::time::sleep(std::time::Duration::from_millis(25)).await;
            self.0.read(path).await
        }

        async fn write(
            &self,
            path: &str,
            content: &str,
            sha: Option<&str>,
            message: &str,
        ) -> Result<String> {
            self.0.write(path, content, sha, message).await
        }

        async fn delete(&self, path: &str, sha: &str, message: &str) -> Result<()> {
            self.0.delete(path, sha, message).await
        }

        async fn exists(&self, path: &str) -> Result<bool> {
            self.0.exists(path).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_loads_coalesce() {
        let inner = Arc::new(crate::api::TestStore::default());
        let files = crate::api::FileStore::new(Arc::new(SlowStore(Arc::clone(&inner))));
        let ledger = Arc::new(Ledger::new(files, "data"));
        let key = ShardKey::new(2025, 7);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move { ledger.load_shard(key).await }));
        }
        let mut shards = Vec::new();
        for handle in handles {
            shards.push(handle.await.unwrap().unwrap());
        }

        // All callers observed one consistent outcome from exactly one pair
        // of remote reads.
        for shard in &shards {
            assert_eq!(
                shard.transactions(TransactionKind::Expense).len(),
                shards[0].transactions(TransactionKind::Expense).len()
            );
            assert_eq!(
                shard.transactions(TransactionKind::Income).len(),
                shards[0].transactions(TransactionKind::Income).len()
            );
        }
        assert_eq!(inner.read_count("data/2025/07/income.json"), 1);
        assert_eq!(inner.read_count("data/2025/07/expenses.json"), 1);
    }

    /// Delegates to a `TestStore`, but parks every read indefinitely while
    /// the flag is set.
    struct StallingStore {
        inner: Arc<crate::api::TestStore>,
        stalled: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl crate::api::RemoteStore for StallingStore {
        async fn read(&self, path: &str) -> Result<RemoteFile> {
            if self.stalled.load(std::sync::atomic::Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            }
            self.inner.read(path).await
        }

        async fn write(
            &self,
            path: &str,
            content: &str,
            sha: Option<&str>,
            message: &str,
        ) -> Result<String> {
            self.inner.write(path, content, sha, message).await
        }

        async fn delete(&self, path: &str, sha: &str, message: &str) -> Result<()> {
            self.inner.delete(path, sha, message).await
        }

        async fn exists(&self, path: &str) -> Result<bool> {
            self.inner.exists(path).await
        }
    }

    #[tokio::test]
    async fn test_cancelled_load_does_not_block_later_loads() {
        let inner = Arc::new(crate::api::TestStore::default());
        let store = Arc::new(StallingStore {
            inner: Arc::clone(&inner),
            stalled: std::sync::atomic::AtomicBool::new(true),
        });
        let files = crate::api::FileStore::new(Arc::clone(&store) as Arc<dyn crate::api::RemoteStore>);
        let ledger = Arc::new(Ledger::new(files, "data"));
        let key = ShardKey::new(2025, 7);

        // A load that the caller gives up on, dropped mid-fetch.
        let first = tokio::spawn({
            let ledger = Arc::clone(&ledger);
            async move { ledger.load_shard(key).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());

        // A later caller must clear the dead marker and load for itself.
        store.stalled.store(false, std::sync::atomic::Ordering::SeqCst);
        let shard = ledger.load_shard(key).await.unwrap();
        assert!(shard.is_loaded());
        assert_eq!(shard.transactions(TransactionKind::Expense).len(), 2);
        assert_eq!(inner.read_count("data/2025/07/income.json"), 1);
    }

    #[tokio::test]
    async fn test_get_shard_uses_cache() {
        let fixture = TestLedger::seeded();
        let key = ShardKey::new(2025, 7);
        fixture.ledger.get_shard(key).await.unwrap();
        fixture.ledger.get_shard(key).await.unwrap();
        assert_eq!(fixture.store.read_count("data/2025/07/income.json"), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let fixture = TestLedger::seeded();
        let key = ShardKey::new(2025, 7);
        fixture.ledger.get_shard(key).await.unwrap();
        fixture.ledger.invalidate(key).await;
        fixture.ledger.get_shard(key).await.unwrap();
        assert_eq!(fixture.store.read_count("data/2025/07/income.json"), 2);
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let fixture = TestLedger::empty();
        fixture.store.seed("data/2024/01/income.json", "{not json");
        assert!(fixture.ledger.load_shard(ShardKey::new(2024, 1)).await.is_err());
        // The failure did not mark the shard loaded.
        fixture.store.seed("data/2024/01/income.json", "[]");
        let shard = fixture.ledger.get_shard(ShardKey::new(2024, 1)).await.unwrap();
        assert!(shard.is_loaded());
    }
}
