//! Randomized group editing simulation
//!
//! Runs a host and a set of clients in one process, delivers their messages
//! in random batches and checks that every replica ends with the same text.
//!
//!   jupiter-sim --clients 5 --operations 200 --seed 7

use anyhow::{Context, Result};
use clap::Parser;
use jupiter_core::config::Config;
use jupiter_core::jupiter::WireFormat;
use jupiter_core::logging::init_logging_with_config;
use std::path::PathBuf;
use tracing::{error, info};

mod simulation;

use simulation::Simulation;

#[derive(Parser, Debug)]
#[command(name = "jupiter-sim")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file (defaults come from JUPITER_* variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of clients attached to the host
    #[arg(long)]
    clients: Option<usize>,

    /// Local edits generated by each client
    #[arg(long)]
    operations: Option<usize>,

    /// RNG seed; rerun with the same seed to replay a failure
    #[arg(long)]
    seed: Option<u64>,

    /// Wire format (json, binary)
    #[arg(long)]
    wire_format: Option<WireFormat>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::from_env().context("reading JUPITER_* environment")?,
    };

    if let Some(clients) = args.clients {
        config.simulation.clients = clients;
    }
    if let Some(operations) = args.operations {
        config.simulation.operations_per_client = operations;
    }
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }
    if let Some(format) = args.wire_format {
        config.engine.wire_format = format;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_logging_with_config(config.logging.to_log_config()?)?;

    info!(
        clients = config.simulation.clients,
        operations = config.simulation.operations_per_client,
        seed = config.simulation.seed,
        wire_format = ?config.engine.wire_format,
        "Simulation starting"
    );

    let mut simulation = Simulation::new(&config)?;
    let report = simulation.run()?;

    info!(
        edits = report.edits,
        messages = report.messages,
        bytes = report.bytes,
        length = report.checksum.length,
        hash = %report.checksum.hash,
        "Simulation finished"
    );

    if !report.diverged.is_empty() {
        error!(clients = ?report.diverged, seed = config.simulation.seed, "Replicas diverged");
        anyhow::bail!(
            "{} replica(s) diverged from the host (seed {})",
            report.diverged.len(),
            config.simulation.seed
        );
    }

    println!("{}", report.text);
    Ok(())
}
