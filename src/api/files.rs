//! The SHA-cache layer over a `RemoteStore`.
//!
//! The remote store requires the current version tag (a content SHA) on every
//! overwrite. `FileStore` remembers the tag seen on each successful read or
//! write, keyed by path, so repeated updates avoid a read-before-write round
//! trip. The cache is derived state and never authoritative: it is refreshed
//! from the server's response after each write and dropped on delete.

use crate::api::{RemoteFile, RemoteStore};
use crate::Result;
use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct FileStore {
    store: Arc<dyn RemoteStore>,
    shas: Mutex<HashMap<String, String>>,
}

impl FileStore {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            shas: Mutex::new(HashMap::new()),
        }
    }

    fn shas(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.shas.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads a file and records its version tag.
    pub async fn read(&self, path: &str) -> Result<RemoteFile> {
        let file = self.store.read(path).await?;
        match &file.sha {
            Some(sha) => {
                self.shas().insert(path.to_string(), sha.clone());
            }
            None => {
                self.shas().remove(path);
            }
        }
        Ok(file)
    }

    /// Replaces the whole file at `path` with `content`.
    ///
    /// The version tag for the overwrite comes from the cache when present and
    /// from a fresh read otherwise; a file that does not exist yet is created
    /// without a tag. A stale tag surfaces as `Error::Conflict`, and the
    /// caller decides whether to re-read and retry.
    pub async fn save(&self, path: &str, content: &str, message: &str) -> Result<()> {
        let cached = self.shas().get(path).cloned();
        let sha = match cached {
            Some(sha) => Some(sha),
            None => self.read(path).await?.sha,
        };
        let new_sha = self
            .store
            .write(path, content, sha.as_deref(), message)
            .await?;
        self.shas().insert(path.to_string(), new_sha);
        Ok(())
    }

    /// Deletes the file at `path` and drops its cache entry.
    pub async fn remove(&self, path: &str, message: &str) -> Result<()> {
        let cached = self.shas().get(path).cloned();
        let sha = match cached {
            Some(sha) => Some(sha),
            None => self.read(path).await?.sha,
        };
        let sha = sha.ok_or_else(|| anyhow!("cannot delete '{path}': the file does not exist"))?;
        self.store.delete(path, &sha, message).await?;
        self.shas().remove(path);
        Ok(())
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        self.store.exists(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestStore;
    use crate::Error;

    fn empty_store() -> (Arc<TestStore>, FileStore) {
        let store = Arc::new(TestStore::new());
        let files = FileStore::new(Arc::clone(&store) as Arc<dyn RemoteStore>);
        (store, files)
    }

    #[tokio::test]
    async fn test_save_creates_then_overwrites() {
        let (store, files) = empty_store();
        files.save("data/a.json", "[1]", "create").await.unwrap();
        files.save("data/a.json", "[1,2]", "update").await.unwrap();
        // Only the first save had to read (a cache miss on a missing file);
        // the second used the cached SHA.
        assert_eq!(store.read_count("data/a.json"), 1);
        let file = files.read("data/a.json").await.unwrap();
        assert!(file.exists);
        assert_eq!(file.content, "[1,2]");
    }

    #[tokio::test]
    async fn test_save_falls_back_to_read_for_unknown_sha() {
        let (store, files) = empty_store();
        store.seed("data/a.json", "[]");
        files.save("data/a.json", "[1]", "update").await.unwrap();
        assert_eq!(store.read_count("data/a.json"), 1);
        assert_eq!(files.read("data/a.json").await.unwrap().content, "[1]");
    }

    #[tokio::test]
    async fn test_stale_sha_conflicts_then_reread_succeeds() {
        let (store, files) = empty_store();
        files.save("data/a.json", "[1]", "create").await.unwrap();
        // Another writer moves the file forward; our cached SHA is now stale.
        store.seed("data/a.json", "[9]");
        let err = files.save("data/a.json", "[2]", "update").await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }), "got {err:?}");
        // Re-reading refreshes the tag and the retry succeeds.
        files.read("data/a.json").await.unwrap();
        files.save("data/a.json", "[2]", "retry").await.unwrap();
        assert_eq!(files.read("data/a.json").await.unwrap().content, "[2]");
    }

    #[tokio::test]
    async fn test_remove_drops_cache_entry() {
        let (_store, files) = empty_store();
        files.save("data/a.json", "[]", "create").await.unwrap();
        files.remove("data/a.json", "cleanup").await.unwrap();
        let file = files.read("data/a.json").await.unwrap();
        assert!(!file.exists);
        assert!(files.remove("data/a.json", "again").await.is_err());
    }
}
