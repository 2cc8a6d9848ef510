use std::collections::BTreeMap;

use super::percentiles::Tail;
use super::{CategoricalMetric, NumericMetric};
use crate::error::{ProcessError, Result};

// ─── Numeric accumulator ─────────────────────────────────────────

/// Running mean plus the raw buffer needed for the tail summary.
///
/// `weight` always equals the number of samples folded in. The buffer only
/// exists while the owning bin is open; sealing swaps it for a [`Tail`].
#[derive(Debug, Clone, PartialEq)]
pub struct NumericStats {
    pub(super) average: f64,
    pub(super) weight: u64,
    pub(super) phase: Phase,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Phase {
    Open { raw_samples: Vec<f64> },
    Sealed { tail: Option<Tail> },
}

impl NumericStats {
    /// `None` until at least one sample has been folded in.
    pub fn average(&self) -> Option<f64> {
        (self.weight > 0).then_some(self.average)
    }

    pub fn weight(&self) -> u64 {
        self.weight
    }

    /// Buffered samples, or `None` once sealed.
    pub fn raw_samples(&self) -> Option<&[f64]> {
        match &self.phase {
            Phase::Open { raw_samples } => Some(raw_samples),
            Phase::Sealed { .. } => None,
        }
    }

    /// The p95/p99 pair; `None` while open or when sealed without samples.
    pub fn tail(&self) -> Option<Tail> {
        match self.phase {
            Phase::Sealed { tail } => tail,
            Phase::Open { .. } => None,
        }
    }
}

impl Default for NumericStats {
    fn default() -> Self {
        Self {
            average: 0.0,
            weight: 0,
            phase: Phase::Open {
                raw_samples: Vec::new(),
            },
        }
    }
}

// ─── Categorical accumulator ─────────────────────────────────────

/// Label → occurrence count. Never summarised further.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTotals(pub(super) BTreeMap<String, u64>);

impl CategoryTotals {
    pub fn as_map(&self) -> &BTreeMap<String, u64> {
        &self.0
    }
}

// ─── Throughput ──────────────────────────────────────────────────

/// Started-query count while the bin is open, per-second rate once sealed.
///
/// Keeping the two states apart means the division by the bin width can only
/// happen on the `Counting → Rate` transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Throughput {
    Counting(u64),
    Rate(f64),
}

impl Throughput {
    /// The rate once sealed; the raw count while still open.
    pub fn reported(self) -> f64 {
        match self {
            Self::Counting(n) => n as f64,
            Self::Rate(rate) => rate,
        }
    }
}

impl Default for Throughput {
    fn default() -> Self {
        Self::Counting(0)
    }
}

// ─── Bin ─────────────────────────────────────────────────────────

/// One fixed-width time bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bin {
    pub(super) processed: bool,
    pub(super) tps: Throughput,
    pub(super) queue_latency: NumericStats,
    pub(super) execution_time: NumericStats,
    pub(super) operation: CategoryTotals,
    pub(super) action: CategoryTotals,
}

impl Bin {
    pub fn processed(&self) -> bool {
        self.processed
    }

    pub fn tps(&self) -> Throughput {
        self.tps
    }

    /// Raw samples held across all numeric metrics; zero once sealed.
    pub fn buffered(&self) -> usize {
        NumericMetric::ALL
            .iter()
            .filter_map(|&m| self.numeric(m).raw_samples())
            .map(<[f64]>::len)
            .sum()
    }

    pub fn numeric(&self, metric: NumericMetric) -> &NumericStats {
        match metric {
            NumericMetric::QueueLatency => &self.queue_latency,
            NumericMetric::ExecutionTime => &self.execution_time,
        }
    }

    pub(super) fn numeric_mut(&mut self, metric: NumericMetric) -> &mut NumericStats {
        match metric {
            NumericMetric::QueueLatency => &mut self.queue_latency,
            NumericMetric::ExecutionTime => &mut self.execution_time,
        }
    }

    pub fn categorical(&self, metric: CategoricalMetric) -> &CategoryTotals {
        match metric {
            CategoricalMetric::Operation => &self.operation,
            CategoricalMetric::Action => &self.action,
        }
    }

    pub(super) fn categorical_mut(&mut self, metric: CategoricalMetric) -> &mut CategoryTotals {
        match metric {
            CategoricalMetric::Operation => &mut self.operation,
            CategoricalMetric::Action => &mut self.action,
        }
    }
}

// ─── BinStore ────────────────────────────────────────────────────

/// Every bin seen during a run, keyed by bin start.
///
/// Keys are always multiples of `bin_size`. The store only grows.
#[derive(Debug, Clone)]
pub struct BinStore {
    bin_size: u64,
    bins: BTreeMap<i64, Bin>,
}

impl BinStore {
    /// `bin_size` must be non-zero and fit an `i64`, so every key derived
    /// from an in-calendar timestamp is representable.
    pub fn new(bin_size: u64) -> Result<Self> {
        if bin_size == 0 || bin_size > i64::MAX as u64 {
            return Err(ProcessError::InvalidBinSize);
        }
        Ok(Self {
            bin_size,
            bins: BTreeMap::new(),
        })
    }

    pub fn bin_size(&self) -> u64 {
        self.bin_size
    }

    /// `floor(timestamp / bin_size) * bin_size`.
    pub fn bin_start_for(&self, timestamp: f64) -> i64 {
        let width = self.bin_size as i64;
        (timestamp / self.bin_size as f64).floor() as i64 * width
    }

    pub fn get(&self, bin_start: i64) -> Option<&Bin> {
        self.bins.get(&bin_start)
    }

    pub(super) fn get_mut(&mut self, bin_start: i64) -> Option<&mut Bin> {
        self.bins.get_mut(&bin_start)
    }

    /// The bin at `bin_start`, created empty on first reference.
    pub(super) fn entry(&mut self, bin_start: i64) -> &mut Bin {
        debug_assert_eq!(bin_start.rem_euclid(self.bin_size as i64), 0);
        self.bins.entry(bin_start).or_default()
    }

    pub fn is_sealed(&self, bin_start: i64) -> bool {
        self.get(bin_start).is_some_and(Bin::processed)
    }

    /// Starts of every bin not yet sealed, ascending.
    pub fn open_starts(&self) -> Vec<i64> {
        self.bins
            .iter()
            .filter(|(_, bin)| !bin.processed)
            .map(|(&start, _)| start)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &Bin)> {
        self.bins.iter().map(|(&start, bin)| (start, bin))
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}
