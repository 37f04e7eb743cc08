//! Remote store access: the `RemoteStore` trait over the GitHub contents API,
//! the SHA-cache layer, token handling, and the in-memory test store.

mod files;
mod github;
mod test_store;
mod token;

use crate::{Config, Result};
use std::sync::Arc;

pub use files::FileStore;
pub use github::{validate_token, GithubStore};
pub use test_store::TestStore;
pub use token::{initialize_token, is_valid_token_format, CredentialProvider, TokenStore};

pub(crate) const GITHUB_API_URL: &str = "https://api.github.com";

/// A file as read from the remote store. A missing file is a legitimate
/// initial state, not an error: it is returned with `exists == false` and
/// empty content.
#[derive(Debug, Clone, Default)]
pub struct RemoteFile {
    /// The decoded file body. Empty when the file does not exist.
    pub content: String,
    /// The server-assigned version tag. `None` when the file does not exist.
    pub sha: Option<String>,
    pub exists: bool,
}

/// The file-contents operations of the remote hosting API.
///
/// Every write replaces the whole file. Overwriting an existing file requires
/// the current version tag; a stale tag fails with `Error::Conflict` and is
/// surfaced to the caller, never retried here.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads a file, treating 404 as `exists == false` rather than an error.
    async fn read(&self, path: &str) -> Result<RemoteFile>;

    /// Creates (`sha == None`) or overwrites (`sha == Some`) a file and
    /// returns the new version tag.
    async fn write(&self, path: &str, content: &str, sha: Option<&str>, message: &str)
        -> Result<String>;

    /// Deletes a file. The current version tag is required.
    async fn delete(&self, path: &str, sha: &str, message: &str) -> Result<()>;

    /// True when a file or directory exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Selects the remote store implementation.
///
/// This allows for running the program without hitting the GitHub API. When
/// `LEDGERLY_IN_TEST_MODE` is set and non-zero in length the mode is
/// `Mode::Test`, otherwise it is `Mode::Github`.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Github,
    Test,
}

impl Mode {
    pub fn from_env() -> Self {
        match std::env::var("LEDGERLY_IN_TEST_MODE") {
            Ok(v) if !v.is_empty() => Mode::Test,
            _ => Mode::Github,
        }
    }
}

/// Creates the SHA-caching file store for the selected mode. `Mode::Github`
/// requires a token; `Mode::Test` uses the seeded in-memory store.
pub fn file_store(mode: Mode, config: &Config, token: Option<String>) -> Result<FileStore> {
    let store: Arc<dyn RemoteStore> = match mode {
        Mode::Github => {
            let token = token.ok_or_else(|| {
                crate::Error::Auth("a GitHub token is required; run 'ledgerly auth' first".into())
            })?;
            Arc::new(GithubStore::new(
                config.owner(),
                config.repo(),
                config.branch(),
                token,
            ))
        }
        Mode::Test => Arc::new(TestStore::default()),
    };
    Ok(FileStore::new(store))
}
