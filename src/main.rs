use clap::Parser;
use ledgerly::args::{Args, CategorySubcommand, Command};
use ledgerly::{commands, Config, Mode, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().ledgerly_home().path();

    // This allows for testing the program without hitting the GitHub API. When
    // LEDGERLY_IN_TEST_MODE is set and non-zero in length, then the mode will
    // be Mode::Test, otherwise it will be Mode::Github.
    let mode = Mode::from_env();

    // Route to appropriate command handler
    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args).await?.print(),

        Command::Auth(auth_args) => {
            let config = Config::load(home).await?;
            if auth_args.verify() {
                commands::auth_verify(&config).await?.print()
            } else {
                commands::auth(&config, auth_args.token()).await?.print()
            }
        }

        Command::Add(add_args) => {
            let config = Config::load(home).await?;
            commands::add(config, mode, add_args).await?.print()
        }

        Command::Update(update_args) => {
            let config = Config::load(home).await?;
            commands::update(config, mode, update_args).await?.print()
        }

        Command::Delete(delete_args) => {
            let config = Config::load(home).await?;
            commands::delete(config, mode, delete_args).await?.print()
        }

        Command::List(month_args) => {
            let config = Config::load(home).await?;
            commands::list(config, mode, month_args).await?.print()
        }

        Command::Summary(month_args) => {
            let config = Config::load(home).await?;
            commands::summary(config, mode, month_args).await?.print()
        }

        Command::Report(report_args) => {
            let config = Config::load(home).await?;
            commands::report(config, mode, report_args).await?.print()
        }

        Command::Category(category_args) => {
            let config = Config::load(home).await?;
            match category_args.command() {
                CategorySubcommand::Add { kind, name } => {
                    commands::category_add(config, mode, *kind, name)
                        .await?
                        .print()
                }
                CategorySubcommand::List => commands::category_list(config, mode).await?.print(),
            }
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
