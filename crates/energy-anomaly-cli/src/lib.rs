//! energy-anomaly CLI - Command-line interface for energy anomaly detection
//!
//! This CLI gives operators a terminal interface to:
//! - Generate synthetic hourly energy series with injected anomalies
//! - Preprocess a table (timestamps, gaps, clipping, derived features)
//! - Run one of the three detectors and inspect its metrics
//!
//! Tables travel as JSON arrays of row objects on files or stdin/stdout.
//! Logs go to stderr.

use clap::{Parser, Subcommand};
use std::ffi::OsString;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod output;

use commands::{detect, preprocess, sample};
pub use error::{CliError, CliResult};

/// energy-anomaly CLI application
#[derive(Parser)]
#[command(name = "energy-anomaly")]
#[command(about = "Unsupervised anomaly detection for energy time series", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (table, json)
    #[arg(short, long, global = true, default_value = "table")]
    output: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Write a synthetic series as JSON records
    Sample(sample::SampleArgs),

    /// Clean a table and derive calendar, lag, and rolling columns
    Preprocess(preprocess::PreprocessArgs),

    /// Run a detector and report its metrics
    Detect(detect::DetectArgs),
}

/// Run using the current process arguments.
pub fn run() -> CliResult<()> {
    run_with_args(std::env::args_os())
}

/// Run using the provided argument iterator.
pub fn run_with_args<I, T>(args: I) -> CliResult<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .try_init();

    match cli.command {
        Commands::Sample(args) => sample::execute(args),
        Commands::Preprocess(args) => preprocess::execute(args),
        Commands::Detect(args) => detect::execute(args, cli.output),
    }
}
