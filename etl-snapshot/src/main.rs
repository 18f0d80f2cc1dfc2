//! Mortgage rate snapshot CLI.
//!
//! Loads configuration, initializes tracing, starts the async runtime and runs one
//! subcommand against the configured operational and analytical stores.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use etl_telemetry::tracing::init_tracing;
use tracing::error;

use crate::config::load_pipeline_config;
use crate::core::{ingest, report, run_pipeline};
use crate::error::{SnapshotError, SnapshotResult};

mod config;
mod core;
mod error;

/// Snapshot ELT for mortgage rates.
#[derive(Parser, Debug)]
#[command(name = "etl-snapshot")]
#[command(about = "Copies operational mortgage rates into an analytical store and reports on them")]
struct Args {
    /// Directory holding the configuration files (default: ./configuration)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs the snapshot pipeline once.
    Run,
    /// Loads a `date,rate` CSV file into the operational store.
    Ingest {
        /// Path to the CSV file
        #[arg(long)]
        csv: PathBuf,
    },
    /// Prints the reporting table and the average adjusted rate.
    Report {
        /// Also export the base rates table with adjusted rates to this CSV file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    match try_main(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn try_main(args: Args) -> SnapshotResult<()> {
    let config = load_pipeline_config(args.config_dir.as_deref())?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME")).map_err(SnapshotError::config)?;

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async move {
            match args.command {
                Command::Run => run_pipeline(config).await,
                Command::Ingest { csv } => ingest(config, &csv).await,
                Command::Report { output } => report(config, output.as_deref()).await,
            }
        });

    if let Err(err) = &result {
        error!("{err}");
    }

    result
}
