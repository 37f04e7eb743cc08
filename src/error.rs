//! The error taxonomy for ledgerly.
//!
//! Validation and not-found errors are deterministic and carry enough detail to
//! identify the offending field or id. Conflict errors mean the remote file
//! changed underneath us (stale version tag); we surface them rather than
//! retrying, and the caller decides whether to re-read and try again.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bad input shape or range. Rejected before any I/O occurs.
    #[error("validation failed for '{field}': {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// A lookup by transaction id missed all loaded shards.
    #[error("transaction '{id}' not found in any loaded month")]
    NotFound { id: String },

    /// The remote store rejected a write because our version tag is stale.
    #[error("conflict writing '{path}': the remote file changed since it was last read")]
    Conflict { path: String },

    /// The credential is missing, malformed, invalid, or expired.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport failure or an unexpected (non-2xx, non-404) remote response.
    #[error("remote store error: {0}")]
    Remote(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Error::NotFound { id: id.into() }
    }

    /// True when re-reading the remote file and retrying may help.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Remote(e.to_string())
    }
}
