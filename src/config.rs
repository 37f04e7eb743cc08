//! Configuration file handling for ledgerly.
//!
//! The configuration file is stored at `$LEDGERLY_HOME/config.json` and names
//! the GitHub repository that holds the ledger data: owner, repository, branch,
//! and the base path within the repository where the month shards live.

use crate::api::TokenStore;
use crate::{utils, Result};
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "ledgerly";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const CONFIG_JSON: &str = "config.json";
const DEFAULT_BRANCH: &str = "main";
const DEFAULT_BASE_PATH: &str = "data";

/// The `Config` object represents the configuration of the app. You
/// instantiate it by providing the path to `$LEDGERLY_HOME` and from there it
/// loads `$LEDGERLY_HOME/config.json`. It provides the repository coordinates
/// and the paths of other items expected within the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the home directory, its `.secrets` subdirectory, and an initial
    /// `config.json` pointing at the given repository.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the home directory, e.g.
    ///   `$HOME/ledgerly`
    /// - `owner` - The GitHub account or organization owning the data repo
    /// - `repo` - The repository name
    /// - `branch` - The branch to read and write; defaults to `main`
    /// - `base_path` - The directory within the repo holding the ledger files;
    ///   defaults to `data`
    ///
    /// # Errors
    /// - Returns an error if any file operations fail.
    pub async fn create(
        dir: impl Into<PathBuf>,
        owner: &str,
        repo: &str,
        branch: Option<&str>,
        base_path: Option<&str>,
    ) -> Result<Self> {
        if owner.trim().is_empty() || repo.trim().is_empty() {
            return Err(anyhow!("An owner and a repository name are required").into());
        }

        // Create the directory if it does not exist
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the ledgerly home directory")?;

        // Canonicalize the directory path
        let root = utils::canonicalize(&maybe_relative).await?;
        let secrets_dir = root.join(SECRETS);
        utils::make_dir(&secrets_dir).await?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.unwrap_or(DEFAULT_BRANCH).to_string(),
            base_path: base_path.unwrap_or(DEFAULT_BASE_PATH).to_string(),
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            secrets: secrets_dir,
            config_path,
            config_file,
        })
    }

    /// This will
    /// - validate that `ledgerly_home` exists and that the config file exists
    /// - load the config file
    /// - validate that the secrets directory exists
    /// - return the loaded configuration object
    pub async fn load(ledgerly_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = ledgerly_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("Ledgerly home is missing; run 'ledgerly init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            return Err(anyhow!("The config file is missing '{}'", config_path.display()).into());
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let config = Self {
            root: root.clone(),
            secrets: root.join(SECRETS),
            config_path,
            config_file,
        };
        if !config.secrets.is_dir() {
            return Err(anyhow!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
            .into());
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn owner(&self) -> &str {
        &self.config_file.owner
    }

    pub fn repo(&self) -> &str {
        &self.config_file.repo
    }

    pub fn branch(&self) -> &str {
        &self.config_file.branch
    }

    pub fn base_path(&self) -> &str {
        &self.config_file.base_path
    }

    /// The token store for this home directory.
    pub fn token_store(&self) -> TokenStore {
        TokenStore::new(&self.secrets)
    }
}

/// Represents the serialization and deserialization format of the
/// configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "ledgerly",
///   "config_version": 1,
///   "owner": "octocat",
///   "repo": "finance-data",
///   "branch": "main",
///   "base_path": "data"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "ledgerly"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// The GitHub account or organization owning the data repository
    owner: String,

    /// The data repository name
    repo: String,

    /// The branch to read and write
    #[serde(default = "default_branch")]
    branch: String,

    /// The directory within the repository holding the ledger files
    #[serde(default = "default_base_path")]
    base_path: String,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_base_path() -> String {
    DEFAULT_BASE_PATH.to_string()
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = utils::read(path).await?;

        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        // Validate app_name
        if config.app_name != APP_NAME {
            return Err(anyhow!(
                "Invalid app_name in config file: expected '{}', got '{}'",
                APP_NAME,
                config.app_name
            )
            .into());
        }

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_create_and_load() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("ledgerly_home");

        let created = Config::create(&home_dir, "octocat", "finance-data", None, None)
            .await
            .unwrap();
        assert_eq!(created.owner(), "octocat");
        assert_eq!(created.repo(), "finance-data");
        assert_eq!(created.branch(), "main");
        assert_eq!(created.base_path(), "data");
        assert!(created.secrets().is_dir());
        assert!(created.config_path().is_file());

        let loaded = Config::load(&home_dir).await.unwrap();
        assert_eq!(loaded.owner(), created.owner());
        assert_eq!(loaded.repo(), created.repo());
        assert_eq!(loaded.base_path(), created.base_path());
    }

    #[tokio::test]
    async fn test_config_create_with_overrides() {
        let dir = TempDir::new().unwrap();
        let config = Config::create(
            dir.path().join("home"),
            "octocat",
            "finance-data",
            Some("ledger"),
            Some("books"),
        )
        .await
        .unwrap();
        assert_eq!(config.branch(), "ledger");
        assert_eq!(config.base_path(), "books");
    }

    #[tokio::test]
    async fn test_config_create_requires_owner_and_repo() {
        let dir = TempDir::new().unwrap();
        let result = Config::create(dir.path().join("home"), "", "finance-data", None, None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(dir.path().join("nope")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let json = r#"{
            "app_name": "ledgerly",
            "config_version": 1,
            "owner": "octocat",
            "repo": "finance-data"
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let config = ConfigFile::load(&config_path).await.unwrap();
        assert_eq!(config.owner, "octocat");
        assert_eq!(config.branch, "main");
        assert_eq!(config.base_path, "data");
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let json = r#"{
            "app_name": "wrong_app",
            "config_version": 1,
            "owner": "octocat",
            "repo": "finance-data"
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let result = ConfigFile::load(&config_path).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.json");

        let original = ConfigFile {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            owner: "octocat".to_string(),
            repo: "finance-data".to_string(),
            branch: "main".to_string(),
            base_path: "data".to_string(),
        };
        original.save(&path).await.unwrap();
        let read = ConfigFile::load(&path).await.unwrap();
        assert_eq!(original, read);
    }
}
