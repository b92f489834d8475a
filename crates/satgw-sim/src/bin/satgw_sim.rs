//! Runs one forward-link scenario and prints its report as JSON.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use satgw_sim::scenario::{Scenario, ScenarioConfig};

/// Satellite gateway forward-link scheduler simulator.
#[derive(Parser, Debug)]
#[command(name = "satgw-sim", about = "Satellite gateway forward-link simulator")]
struct Cli {
    /// Scenario TOML file. Built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the simulated run time.
    #[arg(long)]
    duration_ms: Option<u64>,

    /// Override the RNG seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Print the id mapper tables to stderr after the run.
    #[arg(long, default_value_t = false)]
    dump_ids: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => ScenarioConfig::from_file(path)?,
        None => ScenarioConfig::default(),
    };
    if let Some(duration_ms) = cli.duration_ms {
        config.duration_ms = duration_ms;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    let scenario = Scenario::new(config)?;
    let report = scenario.run()?;

    tracing::info!(
        frames = report.mac.frames_sent,
        dummies = report.mac.dummy_frames_sent,
        utilisation = report.utilisation,
        backlog = report.backlog_bytes,
        "run complete"
    );

    if cli.dump_ids {
        let ids = scenario
            .ids()
            .lock()
            .map_err(|_| anyhow::anyhow!("id mapper lock poisoned"))?;
        eprint!("{}", ids.dump());
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
