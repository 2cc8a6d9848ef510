//! The results document: every bin, keyed by bin start, as one JSON object.
//!
//! This is the fixed schema handed to charting tools. It is plain data and
//! is read back with the same serde types by the `series` command.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{ProcessError, Result};
use crate::metrics::bin::{CategoryTotals, NumericStats};
use crate::metrics::{Bin, BinStore, CategoricalMetric, NumericMetric};

// ─── Document schema ─────────────────────────────────────────────

/// Bin start (epoch seconds) → bin contents.
pub type Document = BTreeMap<i64, BinReport>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinReport {
    pub processed: bool,
    /// Queries started per second.
    pub tps: f64,
    pub queue_latency: NumericReport,
    pub execution_time: NumericReport,
    pub operation: BTreeMap<String, u64>,
    pub action: BTreeMap<String, u64>,
}

/// Mean and tail for one numeric metric. Every statistic is `null` for a
/// metric that never received a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericReport {
    pub average: Option<f64>,
    pub weight: u64,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

impl From<&NumericStats> for NumericReport {
    fn from(stats: &NumericStats) -> Self {
        let tail = stats.tail();
        Self {
            average: stats.average(),
            weight: stats.weight(),
            p95: tail.map(|t| t.p95),
            p99: tail.map(|t| t.p99),
        }
    }
}

fn label_counts(totals: &CategoryTotals) -> BTreeMap<String, u64> {
    totals.as_map().clone()
}

impl From<&Bin> for BinReport {
    fn from(bin: &Bin) -> Self {
        Self {
            processed: bin.processed(),
            tps: bin.tps().reported(),
            queue_latency: bin.numeric(NumericMetric::QueueLatency).into(),
            execution_time: bin.numeric(NumericMetric::ExecutionTime).into(),
            operation: label_counts(bin.categorical(CategoricalMetric::Operation)),
            action: label_counts(bin.categorical(CategoricalMetric::Action)),
        }
    }
}

/// Snapshot the whole store. No further transformation is applied.
pub fn document(store: &BinStore) -> Document {
    store
        .iter()
        .map(|(start, bin)| (start, BinReport::from(bin)))
        .collect()
}

// ─── Writing ─────────────────────────────────────────────────────

/// Where a document goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

impl Destination {
    pub fn from_arg(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) if path.as_os_str() != "-" => Self::File(path),
            _ => Self::Stdout,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("<stdout>"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Serialize `value` as a single JSON value followed by a newline.
pub fn write_json<T: Serialize, W: Write>(value: &T, mut writer: W, pretty: bool) -> io::Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut writer, value)?;
    } else {
        serde_json::to_writer(&mut writer, value)?;
    }
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Write `value` to `dest`.
///
/// File output goes through a temporary file in the same directory that is
/// only renamed into place once fully written.
pub fn persist<T: Serialize>(value: &T, dest: &Destination, pretty: bool) -> Result<()> {
    match dest {
        Destination::Stdout => {
            let stdout = io::stdout();
            write_json(value, BufWriter::new(stdout.lock()), pretty)
                .map_err(|e| ProcessError::io("<stdout>", e))
        }
        Destination::File(path) => {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ProcessError::io(dir, e))?;
            write_json(value, BufWriter::new(tmp.as_file_mut()), pretty)
                .map_err(|e| ProcessError::io(tmp.path(), e))?;
            tmp.persist(path)
                .map_err(|e| ProcessError::io(path, e.error))?;
            Ok(())
        }
    }
}
