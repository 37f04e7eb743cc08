use crate::commands::Out;
use crate::args::InitArgs;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the home directory, its secrets subdirectory, and an initial
/// `config.json` pointing at the given GitHub repository.
///
/// # Arguments
/// - `ledgerly_home` - The directory that will hold configuration, e.g.
///   `$HOME/ledgerly`
/// - `args` - The repository coordinates: owner, repo, and the optional branch
///   and base path
///
/// # Errors
/// - Returns an error if any file operations fail.
pub async fn init(ledgerly_home: &Path, args: &InitArgs) -> Result<Out<()>> {
    let config = Config::create(
        ledgerly_home,
        args.owner(),
        args.repo(),
        args.branch(),
        args.base_path(),
    )
    .await
    .context("Unable to create the home directory and config")?;
    Ok(format!(
        "Initialized {} for {}/{} on branch '{}'",
        config.root().display(),
        config.owner(),
        config.repo(),
        config.branch(),
    )
    .into())
}
