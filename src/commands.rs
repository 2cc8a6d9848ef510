use tracing::{info, warn};

use crate::cli::{RunConfig, SeriesConfig};
use crate::error::Result;
use crate::ingest::RecordReader;
use crate::metrics::{BinCollector, RunSummary};
use crate::output;
use crate::series;

// ─── process ─────────────────────────────────────────────────────

/// Read the whole log once, bin it, and write the results document.
///
/// Any error aborts before the document is written.
pub fn process(config: &RunConfig) -> Result<RunSummary> {
    info!(input = %config.input, bin_size = config.bin_size, "opening metrics log");
    let total = config.input.count_lines()?;
    if let Some(total) = total {
        info!(total, "input line count");
    }

    let mut collector = BinCollector::new(config.bin_size)?;
    let records = RecordReader::new(config.input.open()?, config.input.to_string());
    for record in records {
        collector.record(&record?);

        let line = collector.records();
        if config.progress_every > 0 && line % config.progress_every == 0 {
            info!(
                line,
                total,
                bins = collector.store().len(),
                watermark = collector.watermark(),
                "processing"
            );
        }
    }

    let (store, summary) = collector.finish();
    if store.is_empty() {
        warn!("input contained no records; writing an empty document");
    }
    let document = output::document(&store);
    output::persist(&document, &config.output, config.pretty)?;

    info!(output = %config.output, bins = document.len(), "wrote results document");
    summary.log();
    Ok(summary)
}

// ─── series ──────────────────────────────────────────────────────

/// Returns the number of points emitted.
pub fn series(config: &SeriesConfig) -> Result<usize> {
    let document = series::read_document(&config.results)?;
    let points = series::peak_series(&document, config.window);

    output::persist(&points, &config.output, config.pretty)?;
    info!(
        bins = document.len(),
        points = points.len(),
        output = %config.output,
        "wrote series"
    );
    Ok(points.len())
}
