use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::error::{ProcessError, Result};
use crate::ingest::Input;
use crate::output::Destination;
use crate::series::TpsWindow;

#[derive(Parser, Debug)]
#[command(
    name = "replay-metrics",
    version,
    about = "Bin a query replay metrics log into throughput and latency statistics"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Aggregate a metrics log into fixed-width time bins
    Process(ProcessArgs),

    /// Turn a results document into plot-ready series
    Series(SeriesArgs),
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Metrics log, one JSON record per line (`-` for stdin)
    pub input: PathBuf,

    /// Bin width in seconds
    #[arg(value_parser = clap::value_parser!(u64).range(1..=i64::MAX as u64))]
    pub bin_size: u64,

    /// Write the results document here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Indent the results document
    #[arg(long)]
    pub pretty: bool,

    /// Log progress every N lines (0 disables)
    #[arg(long, default_value_t = default_progress_every())]
    pub progress_every: u64,
}

#[derive(Args, Debug)]
pub struct SeriesArgs {
    /// Results document written by `process`
    pub results: PathBuf,

    /// Write the series here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Indent the output
    #[arg(long)]
    pub pretty: bool,

    /// Edge bins at or below this throughput are trimmed
    #[arg(long, default_value_t = TpsWindow::default().min)]
    pub min_tps: f64,

    /// Edge bins at or above this throughput are trimmed
    #[arg(long, default_value_t = TpsWindow::default().max)]
    pub max_tps: f64,
}

fn default_progress_every() -> u64 {
    10_000
}

// ─── Validated run configuration ─────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub input: Input,
    pub bin_size: u64,
    pub output: Destination,
    pub pretty: bool,
    pub progress_every: u64,
}

impl TryFrom<ProcessArgs> for RunConfig {
    type Error = ProcessError;

    fn try_from(args: ProcessArgs) -> Result<Self> {
        if args.bin_size == 0 || args.bin_size > i64::MAX as u64 {
            return Err(ProcessError::InvalidBinSize);
        }
        Ok(Self {
            input: Input::from_arg(args.input),
            bin_size: args.bin_size,
            output: Destination::from_arg(args.output),
            pretty: args.pretty,
            progress_every: args.progress_every,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesConfig {
    pub results: PathBuf,
    pub output: Destination,
    pub pretty: bool,
    pub window: TpsWindow,
}

impl From<SeriesArgs> for SeriesConfig {
    fn from(args: SeriesArgs) -> Self {
        Self {
            results: args.results,
            output: Destination::from_arg(args.output),
            pretty: args.pretty,
            window: TpsWindow {
                min: args.min_tps,
                max: args.max_tps,
            },
        }
    }
}
