//! Implements the `RemoteStore` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that
//! we can run the whole app, top-to-bottom, without touching the GitHub API.

use crate::api::{RemoteFile, RemoteStore};
use crate::{Error, Result};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct StoredFile {
    content: String,
    sha: String,
}

/// An in-memory store that mimics the hosting API's semantics, including the
/// version-tag compare-and-swap on writes. By default it is seeded with some
/// existing data.
pub struct TestStore {
    files: Mutex<HashMap<String, StoredFile>>,
    reads: Mutex<HashMap<String, usize>>,
    generation: AtomicU64,
}

impl TestStore {
    /// An empty store with no seed data.
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            reads: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    fn files(&self) -> MutexGuard<'_, HashMap<String, StoredFile>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reads(&self) -> MutexGuard<'_, HashMap<String, usize>> {
        self.reads.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A fresh tag for `content`. The generation counter keeps tags unique
    /// even when the same content is stored twice.
    fn next_sha(&self, content: &str) -> String {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        format!("{generation:08x}{:016x}", hasher.finish())
    }

    /// Places `content` at `path` directly, bypassing the tag check. From the
    /// perspective of a client holding an older tag this looks like a
    /// concurrent writer got there first.
    pub fn seed(&self, path: &str, content: &str) {
        let sha = self.next_sha(content);
        self.files().insert(
            path.to_string(),
            StoredFile {
                content: content.to_string(),
                sha,
            },
        );
    }

    /// The number of reads issued for `path`.
    pub fn read_count(&self, path: &str) -> usize {
        self.reads().get(path).copied().unwrap_or(0)
    }

    /// The tag currently stored for `path`.
    pub fn current_sha(&self, path: &str) -> Option<String> {
        self.files().get(path).map(|f| f.sha.clone())
    }
}

impl Default for TestStore {
    /// Loads seed data from this module.
    fn default() -> Self {
        let store = Self::new();
        store.seed("data/2025/07/income.json", SEED_JULY_INCOME);
        store.seed("data/2025/07/expenses.json", SEED_JULY_EXPENSES);
        store.seed("data/category.json", SEED_CATEGORIES);
        store
    }
}

#[async_trait::async_trait]
impl RemoteStore for TestStore {
    async fn read(&self, path: &str) -> Result<RemoteFile> {
        *self.reads().entry(path.to_string()).or_insert(0) += 1;
        Ok(match self.files().get(path) {
            Some(file) => RemoteFile {
                content: file.content.clone(),
                sha: Some(file.sha.clone()),
                exists: true,
            },
            None => RemoteFile::default(),
        })
    }

    async fn write(
        &self,
        path: &str,
        content: &str,
        sha: Option<&str>,
        _message: &str,
    ) -> Result<String> {
        let new_sha = self.next_sha(content);
        let mut files = self.files();
        match (files.get(path), sha) {
            (Some(existing), Some(sha)) if existing.sha == sha => {}
            (None, None) => {}
            // Missing tag on an existing file, stale tag, or a tag supplied
            // for a file that does not exist.
            _ => {
                return Err(Error::Conflict {
                    path: path.to_string(),
                })
            }
        }
        files.insert(
            path.to_string(),
            StoredFile {
                content: content.to_string(),
                sha: new_sha.clone(),
            },
        );
        Ok(new_sha)
    }

    async fn delete(&self, path: &str, sha: &str, _message: &str) -> Result<()> {
        let mut files = self.files();
        match files.get(path) {
            Some(existing) if existing.sha == sha => {
                files.remove(path);
                Ok(())
            }
            Some(_) => Err(Error::Conflict {
                path: path.to_string(),
            }),
            None => Err(Error::Remote(format!(
                "delete of '{path}' failed: the file does not exist"
            ))),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let files = self.files();
        let prefix = format!("{path}/");
        Ok(files.contains_key(path) || files.keys().any(|k| k.starts_with(&prefix)))
    }
}

/// Seed income data.
const SEED_JULY_INCOME: &str = r#"[
  {
    "id": "inc_2025071752050000001a2b",
    "date": "2025-07-01",
    "description": "Salary",
    "amount": 4200.0,
    "category": "Salary",
    "createdAt": "2025-07-01T09:00:00Z",
    "updatedAt": "2025-07-01T09:00:00Z"
  }
]"#;

/// Seed expense data.
const SEED_JULY_EXPENSES: &str = r#"[
  {
    "id": "exp_2025071752054000003c4d",
    "date": "2025-07-20",
    "description": "Whole Foods Market",
    "amount": 87.43,
    "category": "Groceries",
    "createdAt": "2025-07-20T18:30:00Z",
    "updatedAt": "2025-07-20T18:30:00Z"
  },
  {
    "id": "exp_2025071752051200005e6f",
    "date": "2025-07-05",
    "description": "Rent",
    "amount": 1500.0,
    "category": "Housing",
    "createdAt": "2025-07-05T08:00:00Z",
    "updatedAt": "2025-07-05T08:00:00Z"
  }
]"#;

/// Seed category data.
const SEED_CATEGORIES: &str = r#"{
  "income": ["Salary"],
  "expenses": ["Groceries", "Housing"]
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_missing_is_not_an_error() {
        let store = TestStore::new();
        let file = store.read("data/nope.json").await.unwrap();
        assert!(!file.exists);
        assert!(file.sha.is_none());
        assert_eq!(store.read_count("data/nope.json"), 1);
    }

    #[tokio::test]
    async fn test_write_requires_matching_sha() {
        let store = TestStore::new();
        let sha = store.write("f", "one", None, "create").await.unwrap();
        // Creating again without a tag conflicts, as does a stale tag.
        assert!(store.write("f", "x", None, "again").await.unwrap_err().is_conflict());
        let newer = store.write("f", "two", Some(&sha), "update").await.unwrap();
        assert!(store
            .write("f", "three", Some(&sha), "stale")
            .await
            .unwrap_err()
            .is_conflict());
        store.write("f", "three", Some(&newer), "fresh").await.unwrap();
    }

    #[tokio::test]
    async fn test_exists_covers_directories() {
        let store = TestStore::default();
        assert!(store.exists("data").await.unwrap());
        assert!(store.exists("data/2025/07/income.json").await.unwrap());
        assert!(!store.exists("data/2019").await.unwrap());
    }

    #[tokio::test]
    async fn test_seed_data_parses() {
        let store = TestStore::default();
        let file = store.read("data/2025/07/expenses.json").await.unwrap();
        let parsed: Vec<crate::model::Transaction> =
            serde_json::from_str(&file.content).unwrap();
        assert_eq!(parsed.len(), 2);
    }
}
