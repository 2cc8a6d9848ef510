use hdrhistogram::Histogram;

// ─── Per-bin tail summary ────────────────────────────────────────

/// The 95th/99th percentile pair kept for a sealed numeric metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tail {
    pub p95: f64,
    pub p99: f64,
}

impl Tail {
    /// Summarise a bin's buffered samples. `None` when nothing was buffered.
    pub fn from_samples(mut samples: Vec<f64>) -> Option<Self> {
        samples.sort_by(f64::total_cmp);
        Some(Self {
            p95: percentile(&samples, 95.0)?,
            p99: percentile(&samples, 99.0)?,
        })
    }
}

/// Linear-interpolation percentile over an ascending slice.
///
/// The rank `pct / 100 * (n - 1)` falls between two neighbours; the result
/// is the straight-line blend between them. An empty slice has no
/// percentile.
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (pct / 100.0).clamp(0.0, 1.0) * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;

    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

// ─── Whole-run distribution ──────────────────────────────────────

/// Microsecond distribution of one numeric metric across every record of a
/// run, as printed in the closing log lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunDistribution {
    pub count: u64,
    pub mean: f64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub p999: u64,
    pub max: u64,
}

impl RunDistribution {
    /// `None` for a histogram that never saw a record.
    pub fn from_histogram(hist: &Histogram<u64>) -> Option<Self> {
        if hist.len() == 0 {
            return None;
        }
        Some(Self {
            count: hist.len(),
            mean: hist.mean(),
            p50: hist.value_at_quantile(0.5),
            p95: hist.value_at_quantile(0.95),
            p99: hist.value_at_quantile(0.99),
            p999: hist.value_at_quantile(0.999),
            max: hist.max(),
        })
    }
}
