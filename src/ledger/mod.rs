//! The file-backed data manager.
//!
//! `Ledger` keeps an in-memory working set of month shards consistent with the
//! remote store. The remote store has no transactions and no multi-file
//! atomicity; every mutation here rewrites one whole shard file (or, for a
//! cross-month move, two files without joint atomicity; see `ops`).
//!
//! The cache and the file store are injected, not ambient: construct a
//! `Ledger` with the `FileStore` it should write through.

mod cache;
mod ops;
mod report;

use crate::api::FileStore;
use crate::model::{CategoryIndex, MonthShard, ShardKey};
use std::collections::HashMap;
use tokio::sync::watch;

pub use ops::FoundTransaction;
pub use report::{percentage_change, CategoryTotal, CombinedEntry, MonthSummary, RollingAverage};

pub struct Ledger {
    files: FileStore,
    base_path: String,
    state: tokio::sync::Mutex<LedgerState>,
}

/// Mutable state behind one async mutex. The lock is never held across remote
/// I/O; operations stage their file contents under the lock and write after
/// releasing it.
#[derive(Default)]
struct LedgerState {
    shards: HashMap<ShardKey, MonthShard>,
    in_flight: HashMap<ShardKey, watch::Receiver<LoadState>>,
    categories: Option<CategoryIndex>,
}

/// Progress of a coalesced shard load, broadcast to attached followers.
#[derive(Debug, Clone)]
enum LoadState {
    Pending,
    Loaded,
    Failed(String),
}

impl Ledger {
    pub fn new(files: FileStore, base_path: impl Into<String>) -> Self {
        Self {
            files,
            base_path: base_path.into(),
            state: tokio::sync::Mutex::new(LedgerState::default()),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}
