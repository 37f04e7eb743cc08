//! Command handlers for the ledgerly CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod add;
mod auth;
mod category;
mod delete;
mod init;
mod query;
mod update;

use crate::api::Mode;
use crate::args::MonthArgs;
use crate::ledger::Ledger;
use crate::model::ShardKey;
use crate::{Config, Result};
use chrono::{Datelike, Local};
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use add::add;
pub use auth::{auth, auth_verify};
pub use category::{category_add, category_list};
pub use delete::delete;
pub use init::init;
pub use query::{list, report, summary};
pub use update::update;

/// The output type for a command. This allows the command to return a
/// consistent message and, optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the
    /// command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as
    /// JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// Builds the ledger for a loaded configuration, using the stored token in
/// `Mode::Github` and the in-memory store in `Mode::Test`.
pub(crate) async fn open_ledger(config: &Config, mode: Mode) -> Result<Ledger> {
    let token = match mode {
        Mode::Github => config.token_store().get().await?,
        Mode::Test => None,
    };
    let files = crate::api::file_store(mode, config, token)?;
    Ok(Ledger::new(files, config.base_path()))
}

/// The shard a command should operate on: the given year and month, with the
/// current calendar month filling in whichever is missing.
pub(crate) fn resolve_month(args: &MonthArgs) -> ShardKey {
    let today = Local::now().date_naive();
    ShardKey::new(
        args.year().unwrap_or_else(|| today.year()),
        args.month().unwrap_or_else(|| today.month()),
    )
}
