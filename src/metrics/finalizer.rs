//! Watermark tracking and one-time sealing of bins.
//!
//! A bin is sealed once a record two widths past it has arrived, so samples
//! may trail the newest bin by up to one full width and still be counted.

use tracing::debug;

use super::bin::{BinStore, NumericStats, Phase, Throughput};
use super::percentiles::Tail;
use super::{bin_label, NumericMetric};

// ─── Watermark ───────────────────────────────────────────────────

/// Highest metric bin start seen so far in arrival order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watermark {
    current_max_bin: i64,
}

impl Watermark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> i64 {
        self.current_max_bin
    }

    /// Feed the metric bin of the latest record.
    ///
    /// When the watermark advances, returns the bin that is now due: one
    /// width behind the *previous* watermark.
    pub fn observe(&mut self, metric_bin: i64, bin_size: u64) -> Option<i64> {
        if metric_bin <= self.current_max_bin {
            return None;
        }
        let due = self.current_max_bin - bin_size as i64;
        self.current_max_bin = metric_bin;
        Some(due)
    }

    /// Bins flushed at end of stream: one width behind the watermark, then
    /// the watermark bin itself.
    pub fn trailing(&self, bin_size: u64) -> [i64; 2] {
        [self.current_max_bin - bin_size as i64, self.current_max_bin]
    }
}

// ─── Finalize ────────────────────────────────────────────────────

/// Seal the bin at `bin_start`.
///
/// Replaces each numeric buffer with its p95/p99 pair, turns the start count
/// into a per-second rate and marks the bin processed. Categorical totals are
/// left as they are. Returns `false` without touching anything when the bin
/// does not exist or is already sealed.
pub fn finalize(store: &mut BinStore, bin_start: i64) -> bool {
    let bin_size = store.bin_size();
    let Some(bin) = store.get_mut(bin_start) else {
        return false;
    };
    if bin.processed {
        return false;
    }

    for metric in NumericMetric::ALL {
        bin.numeric_mut(metric).seal();
    }
    bin.tps.seal(bin_size);
    bin.processed = true;

    debug!(
        bin_start,
        at = %bin_label(bin_start),
        queue_latency = bin.queue_latency.weight,
        execution_time = bin.execution_time.weight,
        tps = bin.tps.reported(),
        "sealed bin"
    );
    true
}

impl NumericStats {
    fn seal(&mut self) {
        if let Phase::Open { raw_samples } = &mut self.phase {
            let tail = Tail::from_samples(std::mem::take(raw_samples));
            self.phase = Phase::Sealed { tail };
        }
    }
}

impl Throughput {
    fn seal(&mut self, bin_size: u64) {
        if let Self::Counting(n) = *self {
            *self = Self::Rate(n as f64 / bin_size as f64);
        }
    }
}
