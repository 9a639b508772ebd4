//! Reference-line detection for observation-only metrics.
//!
//! Metrics such as `OBAR` depend on the observations alone. When every
//! model verified against the same observations their values coincide, and
//! a single reference line replaces the per-model lines.

use tracing::warn;

use crate::metrics::Metric;
use crate::pivot::PivotTable;

const REL_TOLERANCE: f64 = 1e-9;

/// A single reference series with optional CI offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceLine {
    pub values: Vec<f64>,
    /// Row means of the lower / upper CI tables.
    pub ci: Option<(Vec<f64>, Vec<f64>)>,
}

fn matches_mean(value: f64, mean: f64) -> bool {
    if !(value.is_finite() && mean.is_finite()) {
        return false;
    }
    if mean == 0.0 {
        return value == 0.0;
    }
    (value / mean - 1.0).abs() <= REL_TOLERANCE
}

/// Detect a reference line for `metric` in `table`.
///
/// Returns `None` for metrics that are not observation-only, and (with a
/// warning) when no model value equals its row mean.
pub fn detect_reference(
    metric: Metric,
    table: &PivotTable,
    ci_tables: Option<(&PivotTable, &PivotTable)>,
) -> Option<ReferenceLine> {
    if !metric.is_observation_only() {
        return None;
    }
    let means = table.row_means();
    let matched = means.iter().enumerate().any(|(row, mean)| {
        (0..table.models().len()).any(|col| matches_mean(table.get(row, col), *mean))
    });
    if !matched {
        warn!(
            "{} differs between models; plotting one line per model instead of a reference line",
            metric
        );
        return None;
    }
    let ci = ci_tables
        .filter(|(lo, hi)| !(lo.is_all_nan() && hi.is_all_nan()))
        .map(|(lo, hi)| (lo.row_means(), hi.row_means()));
    Some(ReferenceLine { values: means, ci })
}
