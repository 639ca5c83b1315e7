//! Pulsecast CLI
//!
//! Trains heart-rate forecasting models from the sensor log, inspects
//! saved model artifacts and summarises recent readings.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{inspect, stats, train};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Pulsecast heart-rate model CLI
#[derive(Parser)]
#[command(name = "pulse")]
#[command(author, version, about = "Train, inspect and monitor Pulsecast heart-rate models", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, env = "PULSE_FORMAT", default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model from the heart-rate log and save the artifact
    Train(train::TrainArgs),

    /// Verify a saved artifact and show its metadata
    Inspect(inspect::InspectArgs),

    /// Summarise the most recent readings in the log
    Stats(stats::StatsArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the report
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match &cli.command {
        Commands::Train(args) => train::run(args, cli.format),
        Commands::Inspect(args) => inspect::run(args, cli.format),
        Commands::Stats(args) => stats::run(args, cli.format),
    }
}
