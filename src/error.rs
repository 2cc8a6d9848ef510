use std::path::PathBuf;

// ─── Unified error type ──────────────────────────────────────────

/// Everything that can abort a `process` or `series` run.
///
/// None of these are recoverable: the run stops at the first one and no
/// document is written.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("i/o error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: malformed record")]
    Malformed {
        line: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: query text has no leading token")]
    EmptyQuery { line: u64 },

    #[error("line {line}: {field} {value} is outside the representable time range")]
    OutOfRange {
        line: u64,
        field: &'static str,
        value: f64,
    },

    #[error("bin size must be between 1 and {} seconds", i64::MAX)]
    InvalidBinSize,

    #[error("cannot decode results document {path}")]
    Results {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ProcessError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ProcessError> = std::result::Result<T, E>;
