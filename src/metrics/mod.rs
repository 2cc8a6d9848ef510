pub mod aggregator;
pub mod bin;
pub mod collector;
pub mod finalizer;
pub mod percentiles;

pub use bin::{Bin, BinStore};
pub use collector::{BinCollector, RunSummary};

use chrono::DateTime;

/// Metrics folded as a running mean plus a buffered tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericMetric {
    QueueLatency,
    ExecutionTime,
}

impl NumericMetric {
    pub const ALL: [Self; 2] = [Self::QueueLatency, Self::ExecutionTime];

    pub fn name(self) -> &'static str {
        match self {
            Self::QueueLatency => "queue_latency",
            Self::ExecutionTime => "execution_time",
        }
    }
}

/// Metrics folded as a label → count table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoricalMetric {
    Operation,
    Action,
}

/// A single observation routed into one bin.
/// The collector derives these from each record and the aggregator folds
/// them in, dispatching on the variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample<'a> {
    Numeric(NumericMetric, f64),
    Categorical(CategoricalMetric, &'a str),
    /// One query started inside the bin.
    Throughput,
}

/// RFC 3339 rendering of a bin start, for log lines.
pub fn bin_label(bin_start: i64) -> String {
    DateTime::from_timestamp(bin_start, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| bin_start.to_string())
}
