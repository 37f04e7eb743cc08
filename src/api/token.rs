//! Token storage and the credential entry seam.
//!
//! The bearer token is persisted in a single file under the secrets directory.
//! Before use it passes a cheap format gate (GitHub tokens start with `ghp_`
//! or `github_pat_`), and expiry is detected with a lightweight authenticated
//! probe of `GET /user`. The core never prompts directly; entry goes through
//! the `CredentialProvider` trait so callers choose the UI modality.

use crate::api::github;
use crate::{Error, Result};
use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const TOKEN_FILE: &str = "token";

/// Supplies a credential when none is stored or the stored one is rejected.
pub trait CredentialProvider: Send + Sync {
    /// Asks for a token when none is stored. `None` means the user declined.
    fn credential(&self) -> Result<Option<String>>;

    /// Asks for a replacement after the current token was rejected. `None`
    /// means the user chose to abort.
    fn on_invalid(&self, reason: &str) -> Result<Option<String>>;
}

/// The persisted token: one opaque value at a fixed location.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(secrets_dir: &Path) -> Self {
        Self {
            path: secrets_dir.join(TOKEN_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored token, or `None` when nothing has been saved yet.
    pub async fn get(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let token = raw.trim().to_string();
                Ok((!token.is_empty()).then_some(token))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Other(anyhow::Error::new(e).context(format!(
                "Failed to read the token file at {}",
                self.path.display()
            )))),
        }
    }

    /// Saves the token with restrictive file permissions.
    pub async fn save(&self, token: &str) -> Result<()> {
        tokio::fs::write(&self.path, token.trim())
            .await
            .with_context(|| format!("Failed to write the token file at {}", self.path.display()))?;

        // Set restrictive permissions (0600 on Unix)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, permissions).with_context(|| {
                format!("Failed to set permissions on {}", self.path.display())
            })?;
        }
        Ok(())
    }

    /// Removes the stored token if there is one.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Other(anyhow::Error::new(e).context(format!(
                "Failed to remove the token file at {}",
                self.path.display()
            )))),
        }
    }
}

/// A cheap shape check before any network call. GitHub personal access tokens
/// start with `ghp_` (classic) or `github_pat_` (fine-grained).
pub fn is_valid_token_format(token: &str) -> bool {
    let trimmed = token.trim();
    trimmed.starts_with("ghp_") || trimmed.starts_with("github_pat_")
}

/// Produces a working token or fails with `Error::Auth`.
///
/// The stored token is probed first. If it is missing, malformed, or rejected
/// by the remote API, the provider is asked once for a replacement, which is
/// probed and persisted before being returned.
pub async fn initialize_token(
    store: &TokenStore,
    provider: &dyn CredentialProvider,
) -> Result<String> {
    if let Some(stored) = store.get().await? {
        debug!("Token found, validating");
        match probe(&stored).await? {
            Some(login) => {
                info!("Authenticated as {login}");
                return Ok(stored);
            }
            None => {
                warn!("The stored token is expired or invalid");
                store.clear().await?;
                let replacement = provider
                    .on_invalid("the stored token has expired or is invalid")?
                    .ok_or_else(|| Error::Auth("a GitHub token is required".to_string()))?;
                return accept(store, replacement).await;
            }
        }
    }

    debug!("No stored token");
    let token = provider
        .credential()?
        .ok_or_else(|| Error::Auth("a GitHub token is required".to_string()))?;
    accept(store, token).await
}

/// Validates a candidate token and persists it when the probe succeeds.
async fn accept(store: &TokenStore, token: String) -> Result<String> {
    match probe(&token).await? {
        Some(login) => {
            store.save(&token).await?;
            info!("Token validated and saved, authenticated as {login}");
            Ok(token)
        }
        None => Err(Error::Auth(
            "the provided token is invalid; please check it and try again".to_string(),
        )),
    }
}

/// Format gate plus the authenticated probe call.
async fn probe(token: &str) -> Result<Option<String>> {
    if !is_valid_token_format(token) {
        return Ok(None);
    }
    github::validate_token(token).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_token_format_gate() {
        assert!(is_valid_token_format("ghp_abc123"));
        assert!(is_valid_token_format(" github_pat_xyz "));
        assert!(!is_valid_token_format("gho_other"));
        assert!(!is_valid_token_format(""));
    }

    #[tokio::test]
    async fn test_token_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path());
        assert!(store.get().await.unwrap().is_none());

        store.save("ghp_secret\n").await.unwrap();
        assert_eq!(store.get().await.unwrap().as_deref(), Some("ghp_secret"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        store.clear().await.unwrap();
        assert!(store.get().await.unwrap().is_none());
        // Clearing twice is fine.
        store.clear().await.unwrap();
    }
}
