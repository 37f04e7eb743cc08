//! These structs provide the CLI interface for the ledgerly CLI.

use crate::model::{Amount, TransactionKind};
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// ledgerly: A command-line personal finance tracker.
///
/// Transactions are stored as JSON files in a GitHub repository, one directory
/// per month, and read and written through the GitHub contents API. You need a
/// GitHub repository for the data and a personal access token with access to
/// it. Run `ledgerly init` to point at your repository, then `ledgerly auth`
/// to store the token.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the home directory and initialize the configuration file.
    ///
    /// This is the first command you should run when setting up the ledgerly
    /// CLI.
    ///
    /// - Decide what directory you want configuration stored in and pass this
    ///   as --ledgerly-home. By default, it will be $HOME/ledgerly.
    ///
    /// - Pass the owner and name of the GitHub repository that holds (or will
    ///   hold) your ledger data.
    Init(InitArgs),
    /// Store or verify the GitHub personal access token.
    Auth(AuthArgs),
    /// Add a transaction.
    Add(AddArgs),
    /// Update fields of an existing transaction.
    Update(UpdateArgs),
    /// Delete a transaction.
    Delete(DeleteArgs),
    /// List a month's transactions, income and expenses combined.
    List(MonthArgs),
    /// Show a month's totals and balance.
    Summary(MonthArgs),
    /// Show rolling averages over a trailing window of months.
    Report(ReportArgs),
    /// Manage the category lists.
    Category(CategoryArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where ledgerly configuration is held. Defaults to
    /// ~/ledgerly
    #[arg(long, env = "LEDGERLY_HOME", default_value_t = default_ledgerly_home())]
    ledgerly_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, ledgerly_home: PathBuf) -> Self {
        Self {
            log_level,
            ledgerly_home: ledgerly_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn ledgerly_home(&self) -> &DisplayPath {
        &self.ledgerly_home
    }
}

/// Args for the `ledgerly init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The GitHub account or organization that owns the data repository.
    #[arg(long)]
    owner: String,

    /// The name of the data repository.
    #[arg(long)]
    repo: String,

    /// The branch to read and write. Defaults to "main".
    #[arg(long)]
    branch: Option<String>,

    /// The directory within the repository that holds the ledger files.
    /// Defaults to "data".
    #[arg(long)]
    base_path: Option<String>,
}

impl InitArgs {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn base_path(&self) -> Option<&str> {
        self.base_path.as_deref()
    }
}

/// Args for the `ledgerly auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    /// Verify the stored token instead of entering a new one.
    #[arg(long)]
    verify: bool,

    /// The personal access token. When omitted, the token is read from stdin.
    #[arg(long)]
    token: Option<String>,
}

impl AuthArgs {
    pub fn verify(&self) -> bool {
        self.verify
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/// Args for the `ledgerly add` command.
#[derive(Debug, Parser, Clone)]
pub struct AddArgs {
    /// Whether this is "income" or an "expense".
    kind: TransactionKind,

    /// The transaction date as YYYY-MM-DD.
    #[arg(long)]
    date: String,

    /// What the transaction was for.
    #[arg(long)]
    description: String,

    /// The amount, a positive decimal such as 14.85.
    #[arg(long)]
    amount: Amount,

    /// An optional category name.
    #[arg(long)]
    category: Option<String>,
}

impl AddArgs {
    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

/// Args for the `ledgerly update` command. Options that are not given leave
/// the corresponding field unchanged.
#[derive(Debug, Parser, Clone)]
pub struct UpdateArgs {
    /// The id of the transaction to update.
    id: String,

    /// A new date as YYYY-MM-DD. Moving the date to a different month moves
    /// the transaction between month files.
    #[arg(long)]
    date: Option<String>,

    /// A new description.
    #[arg(long)]
    description: Option<String>,

    /// A new amount.
    #[arg(long)]
    amount: Option<Amount>,

    /// A new category name. Pass an empty string to clear the category.
    #[arg(long)]
    category: Option<String>,
}

impl UpdateArgs {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn amount(&self) -> Option<Amount> {
        self.amount
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

/// Args for the `ledgerly delete` command.
#[derive(Debug, Parser, Clone)]
pub struct DeleteArgs {
    /// The id of the transaction to delete.
    id: String,
}

impl DeleteArgs {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Month selection shared by `list` and `summary`. Defaults to the current
/// month.
#[derive(Debug, Parser, Clone)]
pub struct MonthArgs {
    /// The year, e.g. 2025. Defaults to the current year.
    #[arg(long)]
    year: Option<i32>,

    /// The month as a number from 1 to 12. Defaults to the current month.
    #[arg(long)]
    month: Option<u32>,
}

impl MonthArgs {
    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn month(&self) -> Option<u32> {
        self.month
    }
}

/// Args for the `ledgerly report` command.
#[derive(Debug, Parser, Clone)]
pub struct ReportArgs {
    #[clap(flatten)]
    month: MonthArgs,

    /// How many trailing months to average over, ending at the selected month.
    #[arg(long, default_value_t = 3)]
    months: u32,
}

impl ReportArgs {
    pub fn month(&self) -> &MonthArgs {
        &self.month
    }

    pub fn months(&self) -> u32 {
        self.months
    }
}

/// Args for the `ledgerly category` command.
#[derive(Debug, Parser, Clone)]
pub struct CategoryArgs {
    #[command(subcommand)]
    command: CategorySubcommand,
}

impl CategoryArgs {
    pub fn command(&self) -> &CategorySubcommand {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategorySubcommand {
    /// Add a category name to the income or expense list.
    Add {
        /// Which list the category belongs to: "income" or "expense".
        kind: TransactionKind,

        /// The category name.
        name: String,
    },
    /// Show both category lists.
    List,
}

fn default_ledgerly_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("ledgerly"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --ledgerly-home or LEDGERLY_HOME instead of relying on the \
                default ledgerly home directory. If you continue using the program right now, you \
                may have problems!",
            );
            PathBuf::from("ledgerly")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
