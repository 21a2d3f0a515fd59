use anyhow::{Context, Result};
use clap::Parser;
use oraclegate::acquisition::AcquisitionRun;
use oraclegate::cli::{Cli, OutputFormat};
use oraclegate::config::RunConfig;
use oraclegate::csv_output::RoundMetricsCsv;
use oraclegate::experiment::{derive_seeds, run_seed_sweep};
use oraclegate::json_output::RunArtifacts;
use oraclegate::robustness::RobustnessConfig;
use oraclegate::synthetic::{generate, SyntheticConfig};
use std::fs;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    } else if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Configuration file (or defaults) with command-line overrides applied
fn load_config(args: &Cli) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => RunConfig::default(),
    };

    if let Some(seed) = &args.seed {
        config.seed = seed.clone();
    }
    if let Some(rounds) = args.rounds {
        config.rounds = rounds;
    }
    if let Some(budget) = args.budget {
        config.budget_per_oracle = budget;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    if args.items == 0 {
        anyhow::bail!("Invalid value for --items: 0 (must be >= 1)");
    }
    if args.features == 0 {
        anyhow::bail!("Invalid value for --features: 0 (must be >= 1)");
    }
    if args.sweep_seeds == Some(0) {
        anyhow::bail!("Invalid value for --sweep-seeds: 0 (must be >= 1)");
    }

    let config = load_config(&args)?;

    let dataset = generate(&SyntheticConfig {
        n_items: args.items,
        n_features: args.features,
        seed: config.seed.clone(),
        ..SyntheticConfig::default()
    })
    .context("generating synthetic dataset")?;

    let outcome = AcquisitionRun::new(&dataset, config.clone())?.run()?;
    let mut artifacts = RunArtifacts::from_outcome(outcome)?;

    if let Some(n) = args.sweep_seeds {
        let seeds = derive_seeds(&config.seed, n);
        let sweep = run_seed_sweep(&dataset, &config, &seeds, &RobustnessConfig::default())?;
        artifacts.set_sweep(sweep);
    }

    let json = artifacts.to_json_pretty()?;
    let csv = RoundMetricsCsv::from_rounds(&artifacts.round_metrics).to_csv();

    if let Some(dir) = &args.output {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
        fs::write(dir.join("run.json"), &json).context("writing run.json")?;
        fs::write(dir.join("round_metrics.csv"), &csv).context("writing round_metrics.csv")?;
        tracing::info!(dir = %dir.display(), digest = %artifacts.digest, "artifacts written");
    }

    match args.format {
        OutputFormat::Text => print!("{}", artifacts.to_report_string()),
        OutputFormat::Json => println!("{}", json),
        OutputFormat::Csv => print!("{}", csv),
    }

    Ok(())
}
