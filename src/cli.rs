//! CLI argument parsing for oraclegate

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for run artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text summary (default)
    Text,
    /// JSON run artifact
    Json,
    /// CSV round metrics
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "oraclegate")]
#[command(version)]
#[command(
    about = "Deterministic dual-oracle acquisition loop with budgeted monitorability gates",
    long_about = None
)]
pub struct Cli {
    /// TOML run configuration (defaults apply to missing keys)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Seed string (overrides the configuration file)
    #[arg(short, long)]
    pub seed: Option<String>,

    /// Number of synthetic items to generate
    #[arg(long, value_name = "N", default_value = "500")]
    pub items: usize,

    /// Number of features per synthetic item
    #[arg(long, value_name = "N", default_value = "4")]
    pub features: usize,

    /// Acquisition rounds (overrides the configuration file)
    #[arg(long, value_name = "N")]
    pub rounds: Option<usize>,

    /// Label budget per oracle (overrides the configuration file)
    #[arg(long, value_name = "N")]
    pub budget: Option<usize>,

    /// Directory to write run.json and round_metrics.csv into
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Format printed to stdout
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Also compare the policy against random ranking over N seeds
    #[arg(long = "sweep-seeds", value_name = "N")]
    pub sweep_seeds: Option<usize>,

    /// Enable debug tracing output to stderr
    #[arg(long)]
    pub debug: bool,
}
