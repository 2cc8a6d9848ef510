mod cli;
mod commands;
mod error;
mod ingest;
mod logging;
mod metrics;
mod output;
mod series;

use anyhow::Context;
use clap::Parser;

use crate::cli::{Cli, Command, RunConfig, SeriesConfig};

fn main() -> anyhow::Result<()> {
    // ── 1. Parse arguments (usage errors exit here) ──────────────
    let cli = Cli::parse();

    // ── 2. Logging to stderr ─────────────────────────────────────
    logging::init_logging();

    // ── 3. Dispatch ──────────────────────────────────────────────
    match cli.command {
        Command::Process(args) => {
            let config = RunConfig::try_from(args)?;
            commands::process(&config)
                .with_context(|| format!("failed to process {}", config.input))?;
        }
        Command::Series(args) => {
            let config = SeriesConfig::from(args);
            commands::series(&config).with_context(|| {
                format!("failed to build series from {}", config.results.display())
            })?;
        }
    }

    Ok(())
}
