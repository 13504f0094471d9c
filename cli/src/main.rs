//! Card Vault backup tool
//!
//! Exports an account into a portable zip bundle and imports bundles or
//! legacy JSON exports back into an account of a local store directory.
//!
//! Usage:
//!   cardvault export --store ./vault --account alice --out ./backups
//!   cardvault import --store ./vault --account alice backup.zip
//!   cardvault inspect backup.zip

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use cardvault_migrate::OperationOutcome;
use clap::{Parser, Subcommand};
use tracing::{Level, error};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "cardvault")]
#[command(about = "Export and import Card Vault accounts")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to a TOML migration config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a backup bundle of an account
    Export {
        /// Store directory
        #[arg(long)]
        store: PathBuf,
        /// Account to export
        #[arg(long)]
        account: String,
        /// Directory the bundle is written to
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Import a bundle (.zip) or document (.json) into an account
    Import {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        account: String,
        /// File to import
        file: PathBuf,
    },
    /// Show what a bundle contains
    Inspect { file: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    match run(args).await {
        Ok(outcome) => {
            println!("{}", outcome.message);
            if outcome.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<OperationOutcome> {
    let config = cardvault_cli::load_config(args.config.as_deref())?;
    match args.command {
        Command::Export {
            store,
            account,
            out,
        } => {
            let (outcome, _) = cardvault_cli::export(&store, &account, &out, config).await?;
            Ok(outcome)
        }
        Command::Import {
            store,
            account,
            file,
        } => cardvault_cli::import(&store, &account, &file, config).await,
        Command::Inspect { file } => {
            let inspection = cardvault_cli::inspect(&file).await?;
            Ok(OperationOutcome::success(serde_json::to_string_pretty(
                &inspection,
            )?))
        }
    }
}
