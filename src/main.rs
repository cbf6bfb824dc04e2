use anyhow::Result;
use chainledger::core::log::init_logging;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Classify and value a ledger export, then print the totals
    Report {
        /// JSON file of ledger rows from the wallet fetcher
        #[arg(short, long)]
        transactions: PathBuf,
        /// First confirmation date to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last confirmation date to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage manual classification overrides
    #[command(subcommand)]
    Overrides(OverrideCommands),
}

#[derive(Subcommand)]
enum OverrideCommands {
    /// List all overrides
    List,
    /// Force a classification for a transaction hash
    Set {
        hash: String,
        /// INCOME, EXPENSE, TRANSFER or UNKNOWN
        classification: String,
        #[arg(short, long)]
        note: Option<String>,
    },
    /// Remove the override for a transaction hash
    Remove { hash: String },
}

impl From<Commands> for chainledger::AppCommand {
    fn from(cmd: Commands) -> chainledger::AppCommand {
        match cmd {
            Commands::Report {
                transactions,
                from,
                to,
                json,
            } => chainledger::AppCommand::Report {
                transactions,
                from,
                to,
                json,
            },
            Commands::Overrides(OverrideCommands::List) => chainledger::AppCommand::ListOverrides,
            Commands::Overrides(OverrideCommands::Set {
                hash,
                classification,
                note,
            }) => chainledger::AppCommand::SetOverride {
                hash,
                classification,
                note,
            },
            Commands::Overrides(OverrideCommands::Remove { hash }) => {
                chainledger::AppCommand::RemoveOverride { hash }
            }
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => chainledger::cli::setup::setup_at_path(path),
            None => chainledger::cli::setup::setup(),
        },
        Some(cmd) => chainledger::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
