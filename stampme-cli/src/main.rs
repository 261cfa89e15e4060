//! StampMe command-line tool
//!
//! Replays scripted escrow operations against an in-memory token so ledger
//! behavior can be inspected without a chain.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use stampme_escrow::{split_fee, Clock, LedgerConfig, SystemClock};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod script;

use script::{parse_script, Replayer};

#[derive(Parser)]
#[command(name = "stampme", version, about = "StampMe message escrow tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a JSON-lines script against a fresh ledger
    Replay {
        /// Ledger configuration (TOML)
        #[arg(long)]
        config: PathBuf,
        /// Script with one JSON step per line
        #[arg(long)]
        script: PathBuf,
        /// Unix seconds the simulated clock starts at (defaults to now)
        #[arg(long)]
        start_time: Option<u64>,
        /// Stop at the first rejected step
        #[arg(long)]
        fail_fast: bool,
    },
    /// Show how a release of `amount` would be split
    Fee {
        #[arg(long)]
        amount: u128,
        #[arg(long)]
        percentage: u8,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Replay {
            config,
            script,
            start_time,
            fail_fast,
        } => replay(config, script, start_time, fail_fast).await,
        Command::Fee { amount, percentage } => {
            let split = split_fee(amount, percentage)?;
            println!("{}", serde_json::to_string_pretty(&split)?);
            Ok(())
        }
    }
}

async fn replay(
    config_path: PathBuf,
    script_path: PathBuf,
    start_time: Option<u64>,
    fail_fast: bool,
) -> Result<()> {
    let config = LedgerConfig::load(&config_path)?;
    info!("Configuration loaded from {}", config_path.display());

    let text = std::fs::read_to_string(&script_path)
        .with_context(|| format!("failed to read {}", script_path.display()))?;
    let steps = parse_script(&text)?;

    let replayer = Replayer::new(config, start_time.unwrap_or_else(|| SystemClock.now()))?;

    let mut rejected = 0usize;
    for (line, step) in &steps {
        match replayer.apply(step).await {
            Ok(outcome) => info!(line, "{}", outcome),
            Err(e) if fail_fast => {
                return Err(e.context(format!("line {} rejected", line)));
            }
            Err(e) => {
                rejected += 1;
                error!(line, "rejected: {:#}", e);
            }
        }
    }

    let snapshot = replayer.ledger.snapshot().await;
    let solvency = match replayer.ledger.verify_solvency().await {
        Ok(pending) => json!({ "ok": true, "pending": pending.to_string() }),
        Err(e) => json!({ "ok": false, "error": e.to_string() }),
    };

    let report = json!({
        "steps": steps.len(),
        "rejected": rejected,
        "solvency": solvency,
        "snapshot": snapshot,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
