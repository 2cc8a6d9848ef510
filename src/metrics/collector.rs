use hdrhistogram::Histogram;
use tracing::{debug, info, warn};

use super::aggregator::fold_sample;
use super::bin::{Bin, BinStore};
use super::finalizer::{finalize, Watermark};
use super::percentiles::RunDistribution;
use super::{bin_label, NumericMetric, Sample};
use crate::error::Result;
use crate::ingest::Record;

// ─── Configuration ───────────────────────────────────────────────

/// Whole-run HdrHistogram range: 1 μs → 1 h, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 3_600_000_000;
const HIST_SIGFIG: u8 = 3;

// ─── Public types ────────────────────────────────────────────────

/// Single-pass binning engine.
///
/// Owns the [`BinStore`] and the watermark; every record is folded in and
/// checked against the watermark before the next one is read.
pub struct BinCollector {
    store: BinStore,
    watermark: Watermark,
    totals: RunTotals,
}

/// What the run saw, for the closing log lines.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub records: u64,
    pub bins: usize,
    /// Records whose metric bin had already been sealed; their samples were dropped.
    pub late_records: u64,
    /// Start counts dropped because their throughput bin had already been sealed.
    pub late_starts: u64,
    /// Bins still open after the trailing flush, sealed by the final sweep.
    pub swept_bins: usize,
    /// Most raw samples any single bin held before it was sealed.
    pub peak_buffered: usize,
    /// `None` when the run had no records.
    pub queue_latency: Option<RunDistribution>,
    pub execution_time: Option<RunDistribution>,
}

// ─── Internal state ──────────────────────────────────────────────

struct RunTotals {
    records: u64,
    late_records: u64,
    late_starts: u64,
    peak_buffered: usize,
    queue_latency_hist: Histogram<u64>,
    execution_time_hist: Histogram<u64>,
}

// ─── BinCollector impl ───────────────────────────────────────────

impl BinCollector {
    pub fn new(bin_size: u64) -> Result<Self> {
        Ok(Self {
            store: BinStore::new(bin_size)?,
            watermark: Watermark::new(),
            totals: RunTotals::new(),
        })
    }

    /// Fold one record into its bins, then advance the watermark.
    pub fn record(&mut self, record: &Record) {
        self.totals.observe(record);

        // ── Latency / execution / categorical metrics ───────────
        let metric_bin = self.store.bin_start_for(record.entry_timestamp);
        if self.store.is_sealed(metric_bin) {
            self.totals.late_records += 1;
            warn!(
                bin_start = metric_bin,
                watermark = self.watermark.current(),
                query = %record.query_text,
                "record arrived after its bin was sealed; dropping samples"
            );
        } else {
            let bin = self.store.entry(metric_bin);
            for sample in record.metric_samples() {
                fold_sample(bin, sample);
            }
        }

        // ── Throughput, keyed by start time ─────────────────────
        let tps_bin = self.store.bin_start_for(record.start_time());
        if self.store.is_sealed(tps_bin) {
            self.totals.late_starts += 1;
            debug!(bin_start = tps_bin, "start landed in a sealed bin; not counted");
        } else {
            fold_sample(self.store.entry(tps_bin), Sample::Throughput);
        }

        // ── Watermark ───────────────────────────────────────────
        if let Some(due) = self.watermark.observe(metric_bin, self.store.bin_size()) {
            debug!(watermark = metric_bin, at = %bin_label(metric_bin), due, "watermark advanced");
            self.seal(due);
        }
    }

    pub fn store(&self) -> &BinStore {
        &self.store
    }

    pub fn watermark(&self) -> i64 {
        self.watermark.current()
    }

    pub fn records(&self) -> u64 {
        self.totals.records
    }

    /// Finalize `bin_start`, noting how many raw samples it was holding.
    fn seal(&mut self, bin_start: i64) -> bool {
        let buffered = self.store.get(bin_start).map_or(0, Bin::buffered);
        let sealed = finalize(&mut self.store, bin_start);
        if sealed {
            self.totals.peak_buffered = self.totals.peak_buffered.max(buffered);
        }
        sealed
    }

    /// End of stream: flush the two trailing bins the watermark can no
    /// longer reach, then seal anything else still open.
    pub fn finish(mut self) -> (BinStore, RunSummary) {
        for bin_start in self.watermark.trailing(self.store.bin_size()) {
            self.seal(bin_start);
        }

        let leftover = self.store.open_starts();
        for &bin_start in &leftover {
            self.seal(bin_start);
        }
        if !leftover.is_empty() {
            debug!(count = leftover.len(), "swept bins left open behind the watermark");
        }

        let summary = RunSummary {
            records: self.totals.records,
            bins: self.store.len(),
            late_records: self.totals.late_records,
            late_starts: self.totals.late_starts,
            swept_bins: leftover.len(),
            peak_buffered: self.totals.peak_buffered,
            queue_latency: RunDistribution::from_histogram(&self.totals.queue_latency_hist),
            execution_time: RunDistribution::from_histogram(&self.totals.execution_time_hist),
        };
        (self.store, summary)
    }
}

// ─── RunTotals impl ──────────────────────────────────────────────

impl RunTotals {
    fn new() -> Self {
        Self {
            records: 0,
            late_records: 0,
            late_starts: 0,
            peak_buffered: 0,
            queue_latency_hist: Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
                .expect("histogram creation"),
            execution_time_hist: Histogram::<u64>::new_with_bounds(
                HIST_LOW,
                HIST_HIGH,
                HIST_SIGFIG,
            )
            .expect("histogram creation"),
        }
    }

    fn observe(&mut self, record: &Record) {
        self.records += 1;
        // Clamp to ≥ 1 μs; negative latencies (replayer ahead of schedule) land there too
        self.queue_latency_hist
            .saturating_record(micros(record.queue_latency));
        self.execution_time_hist
            .saturating_record(micros(record.execution_time));
    }
}

fn micros(seconds: f64) -> u64 {
    ((seconds * 1_000_000.0).round() as u64).max(HIST_LOW)
}

// ─── RunSummary impl ─────────────────────────────────────────────

impl RunSummary {
    pub fn log(&self) {
        info!(
            records = self.records,
            bins = self.bins,
            late_records = self.late_records,
            late_starts = self.late_starts,
            swept_bins = self.swept_bins,
            peak_buffered = self.peak_buffered,
            "run complete"
        );
        for metric in NumericMetric::ALL {
            let Some(dist) = self.distribution(metric) else {
                continue;
            };
            info!(
                metric = metric.name(),
                count = dist.count,
                mean_us = dist.mean,
                p50_us = dist.p50,
                p95_us = dist.p95,
                p99_us = dist.p99,
                p999_us = dist.p999,
                max_us = dist.max,
                "whole-run distribution"
            );
        }
    }

    pub fn distribution(&self, metric: NumericMetric) -> Option<RunDistribution> {
        match metric {
            NumericMetric::QueueLatency => self.queue_latency,
            NumericMetric::ExecutionTime => self.execution_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::bin::Throughput;
    use crate::metrics::CategoricalMetric;
    use pretty_assertions::assert_eq;

    fn record(ts: f64, queue_latency: f64, execution_time: f64, query: &str) -> Record {
        Record {
            entry_timestamp: ts,
            queue_latency,
            execution_time,
            operation: "Query".into(),
            query_text: query.into(),
            action: query.split_whitespace().next().unwrap().into(),
        }
    }

    fn exec(ts: f64, execution_time: f64) -> Record {
        record(ts, 0.0, execution_time, "SELECT 1")
    }

    fn average(store: &BinStore, bin_start: i64) -> Option<f64> {
        store
            .get(bin_start)
            .unwrap()
            .numeric(NumericMetric::ExecutionTime)
            .average()
    }

    #[test]
    fn end_to_end_scenario() {
        // Arrange
        let mut collector = BinCollector::new(10).unwrap();

        // Act
        for (ts, v) in [(0.0, 1.0), (3.0, 2.0), (9.0, 3.0), (11.0, 5.0), (25.0, 1.0)] {
            collector.record(&exec(ts, v));
        }

        // Assert: bin 0 sealed when 25 arrived, 10 and 20 still open
        let store = collector.store();
        let bin0 = store.get(0).unwrap();
        assert!(bin0.processed());
        assert_eq!(average(store, 0), Some(2.0));
        assert_eq!(bin0.numeric(NumericMetric::ExecutionTime).weight(), 3);
        assert!(!store.get(10).unwrap().processed());
        assert!(!store.get(20).unwrap().processed());
        assert_eq!(collector.watermark(), 20);

        let (store, summary) = collector.finish();
        let bin10 = store.get(10).unwrap();
        let bin20 = store.get(20).unwrap();
        assert!(bin10.processed());
        assert_eq!(average(&store, 10), Some(5.0));
        assert_eq!(bin10.numeric(NumericMetric::ExecutionTime).weight(), 1);
        assert!(bin20.processed());
        assert_eq!(average(&store, 20), Some(1.0));
        assert_eq!(summary.records, 5);
        assert_eq!(summary.bins, 3);
        assert_eq!(summary.swept_bins, 0);
        assert_eq!(summary.late_records, 0);
        // bin 0 held three samples for each of the two numeric metrics
        assert_eq!(summary.peak_buffered, 6);
    }

    #[test]
    fn record_one_bin_behind_watermark_is_still_folded() {
        let mut collector = BinCollector::new(10).unwrap();
        collector.record(&exec(0.0, 1.0));
        collector.record(&exec(12.0, 1.0));

        // Watermark is 10; bin 0 is one width behind and still open
        collector.record(&exec(5.0, 4.0));
        assert!(!collector.store().is_sealed(0));

        // Bin 20 arrives: bin 0 is sealed with the late sample included
        collector.record(&exec(21.0, 1.0));
        let bin0 = collector.store().get(0).unwrap();
        assert!(bin0.processed());
        assert_eq!(bin0.numeric(NumericMetric::ExecutionTime).weight(), 2);
        assert_eq!(average(collector.store(), 0), Some(2.5));
    }

    #[test]
    fn record_for_sealed_bin_is_dropped() {
        let mut collector = BinCollector::new(10).unwrap();
        for ts in [0.0, 10.0, 20.0] {
            collector.record(&exec(ts, 1.0));
        }
        let sealed = collector.store().get(0).cloned();

        collector.record(&exec(3.0, 100.0));

        assert_eq!(collector.store().get(0).cloned(), sealed);
        let (_, summary) = collector.finish();
        assert_eq!(summary.late_records, 1);
        assert_eq!(summary.late_starts, 1);
    }

    #[test]
    fn throughput_is_keyed_by_start_time() {
        // Arrange: 3 starts in bin 0, 2 queries arriving in bin 0 but starting in bin 10
        let mut collector = BinCollector::new(10).unwrap();
        for ts in [1.0, 2.0, 3.0] {
            collector.record(&record(ts, 0.5, 0.1, "SELECT 1"));
        }
        for ts in [4.0, 5.0] {
            collector.record(&record(ts, 8.0, 0.1, "SELECT 1"));
        }

        // Act
        let (store, _) = collector.finish();

        // Assert
        let bin0 = store.get(0).unwrap();
        let bin10 = store.get(10).unwrap();
        assert_eq!(bin0.tps(), Throughput::Rate(0.3));
        assert_eq!(bin0.numeric(NumericMetric::QueueLatency).weight(), 5);
        assert_eq!(bin10.tps(), Throughput::Rate(0.2));
        assert_eq!(bin10.numeric(NumericMetric::QueueLatency).weight(), 0);
        assert!(bin10.processed());
    }

    #[test]
    fn throughput_only_bins_ahead_of_watermark_are_swept() {
        let mut collector = BinCollector::new(10).unwrap();
        collector.record(&record(0.0, 45.0, 0.1, "SELECT 1"));

        let (store, summary) = collector.finish();

        let bin40 = store.get(40).unwrap();
        assert!(bin40.processed());
        assert_eq!(bin40.tps(), Throughput::Rate(0.1));
        assert_eq!(bin40.numeric(NumericMetric::QueueLatency).tail(), None);
        assert_eq!(summary.swept_bins, 1);
        assert!(store.open_starts().is_empty());
    }

    #[test]
    fn bins_skipped_by_a_watermark_jump_are_swept() {
        let mut collector = BinCollector::new(10).unwrap();
        collector.record(&exec(0.0, 1.0));
        collector.record(&exec(10.0, 1.0));
        collector.record(&exec(50.0, 1.0));

        let (store, summary) = collector.finish();

        // The jump from 10 to 50 requested bin 0; bin 10 was only reachable by the sweep
        assert!(store.iter().all(|(_, bin)| bin.processed()));
        assert_eq!(summary.swept_bins, 1);
    }

    #[test]
    fn categorical_totals_survive_finalization() {
        let mut collector = BinCollector::new(60).unwrap();
        for query in ["SELECT a", "select b", "SELECT c", "INSERT d"] {
            collector.record(&record(10.0, 0.0, 0.1, query));
        }

        let (store, _) = collector.finish();

        let action = store.get(0).unwrap().categorical(CategoricalMetric::Action);
        assert_eq!(action.as_map()["SELECT"], 2);
        assert_eq!(action.as_map()["select"], 1);
        assert_eq!(action.as_map()["INSERT"], 1);
        let operation = store.get(0).unwrap().categorical(CategoricalMetric::Operation);
        assert_eq!(operation.as_map()["Query"], 4);
    }

    #[test]
    fn summary_distribution_in_microseconds() {
        let mut collector = BinCollector::new(10).unwrap();
        collector.record(&exec(0.0, 0.002));
        collector.record(&exec(1.0, 0.004));

        let (_, summary) = collector.finish();

        let execution = summary.distribution(NumericMetric::ExecutionTime).unwrap();
        assert_eq!(execution.count, 2);
        assert!((4000..4004).contains(&execution.max));
        // zero latency is clamped to the 1 μs floor
        assert_eq!(summary.queue_latency.map(|d| d.max), Some(1));
    }

    #[test]
    fn empty_run_has_no_distribution() {
        let (_, summary) = BinCollector::new(10).unwrap().finish();

        assert_eq!(summary.records, 0);
        assert_eq!(summary.queue_latency, None);
        assert_eq!(summary.distribution(NumericMetric::ExecutionTime), None);
    }
}
