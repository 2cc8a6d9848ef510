//! Folding of individual samples into an open bin.

use super::bin::{Bin, CategoryTotals, NumericStats, Phase, Throughput};
use super::Sample;

/// Apply one sample to `bin`.
///
/// The bin must still be open; the collector never routes a sample into a
/// sealed bin.
pub fn fold_sample(bin: &mut Bin, sample: Sample<'_>) {
    debug_assert!(!bin.processed, "sample folded into a sealed bin");

    match sample {
        Sample::Numeric(metric, value) => bin.numeric_mut(metric).fold(value),
        Sample::Categorical(metric, label) => bin.categorical_mut(metric).increment(label),
        Sample::Throughput => bin.tps.increment(),
    }
}

impl NumericStats {
    /// Weighted blend of the current mean (weight `w`) with one new sample
    /// (weight 1), then buffer the sample for the tail summary.
    fn fold(&mut self, value: f64) {
        let w = self.weight as f64;
        self.average = (self.average * w + value) / (w + 1.0);
        self.weight += 1;

        if let Phase::Open { raw_samples } = &mut self.phase {
            raw_samples.push(value);
        }
    }
}

impl CategoryTotals {
    fn increment(&mut self, label: &str) {
        match self.0.get_mut(label) {
            Some(count) => *count += 1,
            None => {
                self.0.insert(label.to_owned(), 1);
            }
        }
    }
}

impl Throughput {
    fn increment(&mut self) {
        if let Self::Counting(n) = self {
            *n += 1;
        }
    }
}
