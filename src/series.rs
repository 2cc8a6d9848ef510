//! Plot-ready series from a results document.
//!
//! Bins are taken in ascending order, warm-up and cool-down bins at either
//! end are trimmed by their throughput, and the rest are placed on an
//! hours-since-first-bin axis. Drawing is left to whatever reads the output.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ProcessError, Result};
use crate::output::{BinReport, Document, NumericReport};

/// Throughput window outside which edge bins are treated as warm-up or
/// cool-down artifacts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TpsWindow {
    pub min: f64,
    pub max: f64,
}

impl TpsWindow {
    /// Open interval.
    fn contains(&self, tps: f64) -> bool {
        tps > self.min && tps < self.max
    }
}

impl Default for TpsWindow {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 100_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub bin_start: i64,
    pub time: Option<DateTime<Utc>>,
    /// Hours since the first retained bin.
    pub hours: f64,
    pub tps: f64,
    pub queue_latency: Band,
    pub execution_time: Band,
}

/// The three lines drawn per latency chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Band {
    pub average: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

impl From<&NumericReport> for Band {
    fn from(report: &NumericReport) -> Self {
        Self {
            average: report.average,
            p95: report.p95,
            p99: report.p99,
        }
    }
}

pub fn read_document(path: &Path) -> Result<Document> {
    let file = File::open(path).map_err(|e| ProcessError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ProcessError::Results {
        path: path.to_path_buf(),
        source,
    })
}

/// Trim leading and trailing bins whose `tps` falls outside `window`, then
/// lay the remainder out against elapsed hours. Interior bins are kept
/// whatever their throughput.
pub fn peak_series(doc: &Document, window: TpsWindow) -> Vec<SeriesPoint> {
    let bins: Vec<(i64, &BinReport)> = doc.iter().map(|(&start, bin)| (start, bin)).collect();

    let Some(first) = bins.iter().position(|(_, bin)| window.contains(bin.tps)) else {
        return Vec::new();
    };
    let last = bins
        .iter()
        .rposition(|(_, bin)| window.contains(bin.tps))
        .unwrap_or(first);
    let origin = bins[first].0;

    bins[first..=last]
        .iter()
        .map(|&(start, bin)| SeriesPoint {
            bin_start: start,
            time: DateTime::from_timestamp(start, 0),
            hours: (start - origin) as f64 / 3600.0,
            tps: bin.tps,
            queue_latency: Band::from(&bin.queue_latency),
            execution_time: Band::from(&bin.execution_time),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn report(tps: f64, average: f64) -> BinReport {
        let numeric = NumericReport {
            average: Some(average),
            weight: 1,
            p95: Some(average),
            p99: Some(average),
        };
        BinReport {
            processed: true,
            tps,
            queue_latency: numeric.clone(),
            execution_time: numeric,
            operation: BTreeMap::new(),
            action: BTreeMap::new(),
        }
    }

    #[test]
    fn trims_edges_and_keeps_interior() {
        // Arrange
        let doc: Document = [
            (0, report(250_000.0, 1.0)),
            (1800, report(0.0, 1.0)),
            (3600, report(120.0, 2.0)),
            (5400, report(0.0, 3.0)),
            (7200, report(140.0, 4.0)),
            (9000, report(0.0, 5.0)),
        ]
        .into_iter()
        .collect();

        // Act
        let series = peak_series(&doc, TpsWindow::default());

        // Assert
        let starts: Vec<i64> = series.iter().map(|p| p.bin_start).collect();
        assert_eq!(starts, vec![3600, 5400, 7200]);
        let hours: Vec<f64> = series.iter().map(|p| p.hours).collect();
        assert_eq!(hours, vec![0.0, 0.5, 1.0]);
        assert_eq!(series[2].execution_time.average, Some(4.0));
    }

    #[test]
    fn nothing_in_window_yields_empty_series() {
        let doc: Document = [(0, report(0.0, 1.0)), (10, report(100_000.0, 1.0))]
            .into_iter()
            .collect();

        assert!(peak_series(&doc, TpsWindow::default()).is_empty());
    }

    #[test]
    fn custom_window_bounds_are_exclusive() {
        let doc: Document = [(0, report(5.0, 1.0)), (60, report(10.0, 1.0)), (120, report(6.0, 1.0))]
            .into_iter()
            .collect();

        let series = peak_series(&doc, TpsWindow { min: 5.0, max: 10.0 });

        assert_eq!(series.len(), 1);
        assert_eq!(series[0].bin_start, 120);
        assert_eq!(series[0].hours, 0.0);
    }

    #[test]
    fn points_carry_utc_time() {
        let doc: Document = [(1_325_775_480, report(3.0, 1.0))].into_iter().collect();

        let series = peak_series(&doc, TpsWindow::default());

        assert_eq!(
            series[0].time.map(|t| t.to_rfc3339()),
            Some("2012-01-05T14:58:00+00:00".to_string())
        );
    }

    #[test]
    fn reads_document_written_by_process() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(
            &path,
            r#"{"10":{"processed":true,"tps":1.5,"queue_latency":{"average":null,"weight":0,"p95":null,"p99":null},"execution_time":{"average":0.2,"weight":3,"p95":0.3,"p99":0.4},"operation":{"Query":3},"action":{"SELECT":3}}}"#,
        )
        .unwrap();

        let doc = read_document(&path).unwrap();

        assert_eq!(doc[&10].tps, 1.5);
        assert_eq!(doc[&10].queue_latency.average, None);
        assert_eq!(doc[&10].action["SELECT"], 3);
    }

    #[test]
    fn rejects_non_document_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.txt");
        std::fs::write(&path, "{10: {'tps': 1.0}}").unwrap();

        assert!(matches!(
            read_document(&path),
            Err(ProcessError::Results { .. })
        ));
    }
}
