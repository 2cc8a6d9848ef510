//! Line-by-line decoding of the replayer's query metrics log.
//!
//! Each line is a JSON object as dumped by the replayer. Keys carry a leading
//! `:` and the entry timestamp is wrapped in a `{"^t": secs}` time object;
//! plain keys and a bare number are accepted as well.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use chrono::DateTime;
use serde::Deserialize;

use crate::error::{ProcessError, Result};
use crate::metrics::{CategoricalMetric, NumericMetric, Sample};

// ─── Input source ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Stdin,
    File(PathBuf),
}

impl Input {
    /// `-` selects stdin, anything else is a file path.
    pub fn from_arg(path: PathBuf) -> Self {
        if path.as_os_str() == "-" {
            Self::Stdin
        } else {
            Self::File(path)
        }
    }

    pub fn open(&self) -> Result<Box<dyn BufRead>> {
        match self {
            Self::Stdin => Ok(Box::new(io::stdin().lock())),
            Self::File(path) => {
                let file = File::open(path).map_err(|e| ProcessError::io(path, e))?;
                Ok(Box::new(BufReader::new(file)))
            }
        }
    }

    /// Line total for progress reporting. Stdin cannot be read twice, so it
    /// has none.
    pub fn count_lines(&self) -> Result<Option<u64>> {
        match self {
            Self::Stdin => Ok(None),
            Self::File(path) => {
                let file = File::open(path).map_err(|e| ProcessError::io(path, e))?;
                count_lines(BufReader::new(file))
                    .map(Some)
                    .map_err(|e| ProcessError::io(path, e))
            }
        }
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdin => f.write_str("<stdin>"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Count newline-terminated lines, plus a final unterminated one.
pub fn count_lines<R: BufRead>(mut reader: R) -> io::Result<u64> {
    let mut count = 0u64;
    let mut last = b'\n';
    loop {
        let buf = reader.fill_buf()?;
        let Some(&tail) = buf.last() else {
            break;
        };
        count += buf.iter().filter(|&&b| b == b'\n').count() as u64;
        last = tail;
        let len = buf.len();
        reader.consume(len);
    }
    if last != b'\n' {
        count += 1;
    }
    Ok(count)
}

// ─── Record ──────────────────────────────────────────────────────

/// One query execution from the log.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Epoch seconds the query was due; keys the latency metrics.
    pub entry_timestamp: f64,
    /// Seconds the query waited before it started.
    pub queue_latency: f64,
    /// Seconds the query spent executing.
    pub execution_time: f64,
    pub operation: String,
    pub query_text: String,
    /// First whitespace-delimited token of `query_text`.
    pub action: String,
}

impl Record {
    /// Decode one log line. `line` is the 1-based line number for errors.
    pub fn parse(text: &str, line: u64) -> Result<Self> {
        let raw: RawRecord =
            serde_json::from_str(text).map_err(|source| ProcessError::Malformed { line, source })?;

        // Finite but huge values parse fine and still cannot key a bin.
        let entry_timestamp = raw.entry_timestamp.seconds();
        epoch_seconds(line, "entry_timestamp", entry_timestamp)?;
        epoch_seconds(line, "start_time", entry_timestamp + raw.queue_latency)?;

        let action = raw
            .query
            .split_whitespace()
            .next()
            .ok_or(ProcessError::EmptyQuery { line })?
            .to_owned();

        Ok(Self {
            entry_timestamp,
            queue_latency: raw.queue_latency,
            execution_time: raw.execution_time,
            operation: raw.operation,
            query_text: raw.query,
            action,
        })
    }

    /// When the query actually started: arrival plus queueing delay. Keys
    /// throughput.
    pub fn start_time(&self) -> f64 {
        self.entry_timestamp + self.queue_latency
    }

    /// The samples destined for the record's metric bin.
    pub fn metric_samples(&self) -> [Sample<'_>; 4] {
        [
            Sample::Numeric(NumericMetric::QueueLatency, self.queue_latency),
            Sample::Numeric(NumericMetric::ExecutionTime, self.execution_time),
            Sample::Categorical(CategoricalMetric::Operation, &self.operation),
            Sample::Categorical(CategoricalMetric::Action, &self.action),
        ]
    }
}

/// Both bin keys are derived from these instants, so each must fall inside
/// chrono's calendar range.
fn epoch_seconds(line: u64, field: &'static str, value: f64) -> Result<()> {
    match DateTime::from_timestamp(value.floor() as i64, 0) {
        Some(_) => Ok(()),
        None => Err(ProcessError::OutOfRange { line, field, value }),
    }
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = ":entry_timestamp", alias = "entry_timestamp")]
    entry_timestamp: RawTimestamp,
    #[serde(rename = ":query_queue_latency", alias = "query_queue_latency")]
    queue_latency: f64,
    #[serde(rename = ":execution_time", alias = "execution_time")]
    execution_time: f64,
    #[serde(rename = ":operation", alias = "operation")]
    operation: String,
    #[serde(rename = ":query", alias = "query")]
    query: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Tagged {
        #[serde(rename = "^t")]
        secs: f64,
    },
    Plain(f64),
}

impl RawTimestamp {
    fn seconds(&self) -> f64 {
        match *self {
            Self::Tagged { secs } | Self::Plain(secs) => secs,
        }
    }
}

// ─── Reader ──────────────────────────────────────────────────────

/// Pulls one [`Record`] per input line, in order, without buffering the
/// input.
pub struct RecordReader<R> {
    lines: io::Lines<R>,
    line: u64,
    source: String,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R, source: impl Into<String>) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
            source: source.into(),
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let text = match self.lines.next()? {
            Ok(text) => text,
            Err(e) => return Some(Err(ProcessError::io(&self.source, e))),
        };
        self.line += 1;
        Some(Record::parse(&text, self.line))
    }
}
