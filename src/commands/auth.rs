//! Authentication command handlers.
//!
//! This module implements the CLI commands for:
//! - `ledgerly auth` - Store a personal access token
//! - `ledgerly auth --verify` - Verify the stored token

use crate::api::{initialize_token, validate_token, CredentialProvider, GithubStore, RemoteStore};
use crate::commands::Out;
use crate::{Config, Error, Result};
use std::io::{BufRead, Write};

/// Handles the `ledgerly auth` command.
///
/// Stores a validated personal access token in the secrets directory. With
/// `--token` the given value is validated and stored; otherwise the stored
/// token is checked first and the user is prompted on stdin only when a new
/// token is needed.
///
/// # Errors
/// Returns an error if the token is malformed, rejected by GitHub, or cannot
/// be written.
pub async fn auth(config: &Config, token: Option<&str>) -> Result<Out<()>> {
    let store = config.token_store();
    if let Some(token) = token {
        // An explicit token always replaces whatever is stored.
        store.clear().await?;
        initialize_token(&store, &Preset(token.to_string())).await?;
    } else {
        initialize_token(&store, &StdinPrompt).await?;
    }
    Ok("Token validated and saved".into())
}

/// Handles the `ledgerly auth --verify` command.
///
/// This command never prompts. It probes the stored token with an
/// authenticated call and reports the result.
///
/// # Errors
/// Returns an error if no token is stored or the stored token is rejected.
pub async fn auth_verify(config: &Config) -> Result<Out<()>> {
    let token = config.token_store().get().await?.ok_or_else(|| {
        Error::Auth("no token is stored; run 'ledgerly auth' first".to_string())
    })?;
    let login = match validate_token(&token).await? {
        Some(login) => login,
        None => {
            return Err(Error::Auth(
                "the stored token was rejected; run 'ledgerly auth' to replace it".to_string(),
            ))
        }
    };

    // Confirm the token can actually see the data repository.
    let store = GithubStore::new(config.owner(), config.repo(), config.branch(), token);
    let base = if store.exists(config.base_path()).await? {
        format!(
            "'{}' in {}/{} is present",
            config.base_path(),
            config.owner(),
            config.repo()
        )
    } else {
        format!(
            "'{}' in {}/{} does not exist yet; it will be created on the first write",
            config.base_path(),
            config.owner(),
            config.repo()
        )
    };
    Ok(format!("Your token is valid, authenticated as {login}; {base}").into())
}

/// Reads the token from stdin.
struct StdinPrompt;

impl CredentialProvider for StdinPrompt {
    fn credential(&self) -> Result<Option<String>> {
        prompt("Enter your GitHub personal access token: ")
    }

    fn on_invalid(&self, reason: &str) -> Result<Option<String>> {
        prompt(&format!(
            "The token was rejected ({reason}). Enter a new token, or leave empty to abort: "
        ))
    }
}

/// A token supplied on the command line.
struct Preset(String);

impl CredentialProvider for Preset {
    fn credential(&self) -> Result<Option<String>> {
        Ok(Some(self.0.clone()))
    }

    fn on_invalid(&self, _reason: &str) -> Result<Option<String>> {
        // There is no second value to offer.
        Ok(None)
    }
}

fn prompt(message: &str) -> Result<Option<String>> {
    let mut stderr = std::io::stderr();
    stderr
        .write_all(message.as_bytes())
        .and_then(|_| stderr.flush())
        .map_err(|e| Error::Auth(format!("unable to prompt for a token: {e}")))?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| Error::Auth(format!("unable to read the token: {e}")))?;
    let trimmed = line.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}
