//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::api::{FileStore, TestStore};
use crate::ledger::Ledger;
use std::sync::Arc;

/// A ledger wired to an in-memory store, with the store kept reachable so
/// tests can seed files and inspect reads and writes directly.
pub(crate) struct TestLedger {
    pub store: Arc<TestStore>,
    pub ledger: Ledger,
}

impl TestLedger {
    /// A ledger over a store with no files at all.
    pub fn empty() -> Self {
        Self::with_store(Arc::new(TestStore::new()))
    }

    /// A ledger over the standard seed data (July 2025 plus the category
    /// index).
    pub fn seeded() -> Self {
        Self::with_store(Arc::new(TestStore::default()))
    }

    pub fn with_store(store: Arc<TestStore>) -> Self {
        let files = FileStore::new(store.clone());
        Self {
            store,
            ledger: Ledger::new(files, "data"),
        }
    }
}
