//! Bootstrap confidence intervals for aggregated metrics.
//!
//! Two resampling schemes:
//! - `FORECASTS`: resample one model's rows with replacement and recompute
//!   the metric from the resampled partial sums.
//! - `MATCHED_PAIRS`: pair a model's rows with the reference model's rows on
//!   the same event, resample the pairs, and recompute the difference
//!   `metric(model) - metric(reference)`.
//!
//! Intervals are returned as signed offsets `(lower - center, upper - center)`
//! so they can be drawn around the plotted value.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use vxts_core::domain::StatRecord;

use crate::config::PlotSettings;
use crate::equalize::EventKey;
use crate::metrics::{metric_value, Metric};

// ─── Configuration ───────────────────────────────────────────────────

/// Resampling scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BootstrapMethod {
    #[default]
    MatchedPairs,
    Forecasts,
}

/// Bootstrap parameters for one plot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Number of resamples.
    pub nrep: usize,
    pub method: BootstrapMethod,
    /// Confidence level in (0, 1).
    pub ci_level: f64,
    /// Groups with fewer rows (or pairs) get no interval.
    pub min_samples: usize,
    pub seed: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            nrep: 5000,
            method: BootstrapMethod::MatchedPairs,
            ci_level: 0.95,
            min_samples: 30,
            seed: 42,
        }
    }
}

impl BootstrapConfig {
    pub fn from_settings(settings: &PlotSettings) -> Self {
        Self {
            nrep: settings.bs_nrep,
            method: settings.bs_method,
            ci_level: settings.ci_lev,
            min_samples: settings.bs_min_samp,
            seed: settings.bs_seed,
        }
    }

    /// Lower and upper percentiles of the interval, in percent.
    fn percentiles(&self) -> (f64, f64) {
        let alpha = (1.0 - self.ci_level).clamp(0.0, 1.0);
        (50.0 * alpha, 100.0 - 50.0 * alpha)
    }
}

// ─── Resampling ──────────────────────────────────────────────────────

/// Interval for `metric` over `rows` by resampling the rows themselves.
///
/// `center` is the metric over the full group; `None` when the group is too
/// small or no resample produced a finite value.
pub fn forecast_ci(
    rows: &[&StatRecord],
    metric: Metric,
    center: f64,
    config: &BootstrapConfig,
    rng: &mut StdRng,
) -> Option<(f64, f64)> {
    let n = rows.len();
    if n == 0 || n < config.min_samples || config.nrep == 0 || !center.is_finite() {
        return None;
    }

    let mut samples = Vec::with_capacity(config.nrep);
    let mut resample: Vec<&StatRecord> = Vec::with_capacity(n);
    for _ in 0..config.nrep {
        resample.clear();
        resample.extend((0..n).map(|_| rows[rng.gen_range(0..n)]));
        let v = metric_value(metric, resample.iter().copied());
        if v.is_finite() {
            samples.push(v);
        }
    }
    offsets(samples, center, config)
}

/// Pair `model_rows` with `reference_rows` on [`EventKey`]; events missing
/// on either side are left out.
pub fn matched_pairs<'a>(
    model_rows: &[&'a StatRecord],
    reference_rows: &[&'a StatRecord],
) -> Vec<(&'a StatRecord, &'a StatRecord)> {
    let reference: BTreeMap<EventKey, &StatRecord> = reference_rows
        .iter()
        .map(|r| (EventKey::of(r), *r))
        .collect();
    model_rows
        .iter()
        .filter_map(|m| reference.get(&EventKey::of(m)).map(|r| (*m, *r)))
        .collect()
}

/// Interval for the difference between a model and the reference model.
///
/// The offsets are relative to the observed difference over all pairs.
pub fn matched_pair_ci(
    pairs: &[(&StatRecord, &StatRecord)],
    metric: Metric,
    config: &BootstrapConfig,
    rng: &mut StdRng,
) -> Option<(f64, f64)> {
    let n = pairs.len();
    if n == 0 || n < config.min_samples || config.nrep == 0 {
        return None;
    }

    let difference = |picked: &[(&StatRecord, &StatRecord)]| {
        metric_value(metric, picked.iter().map(|(m, _)| *m))
            - metric_value(metric, picked.iter().map(|(_, r)| *r))
    };
    let center = difference(pairs);
    if !center.is_finite() {
        return None;
    }

    let mut samples = Vec::with_capacity(config.nrep);
    let mut resample = Vec::with_capacity(n);
    for _ in 0..config.nrep {
        resample.clear();
        resample.extend((0..n).map(|_| pairs[rng.gen_range(0..n)]));
        let d = difference(&resample);
        if d.is_finite() {
            samples.push(d);
        }
    }
    offsets(samples, center, config)
}

fn offsets(mut samples: Vec<f64>, center: f64, config: &BootstrapConfig) -> Option<(f64, f64)> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let (p_lo, p_hi) = config.percentiles();
    let lo = percentile_sorted(&samples, p_lo);
    let hi = percentile_sorted(&samples, p_hi);
    Some((lo - center, hi - center))
}

/// Linear-interpolated percentile of a sorted slice (`p` in percent).
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::sl1l2_record;
    use rand::SeedableRng;

    fn config(min_samples: usize) -> BootstrapConfig {
        BootstrapConfig {
            nrep: 200,
            min_samples,
            ..BootstrapConfig::default()
        }
    }

    fn rows(model: &str, biases: &[f64]) -> Vec<StatRecord> {
        biases
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let valid = format!("202401{:02}_000000", i + 1);
                sl1l2_record(model, &valid, 24, "P500", 1.0 + b, 1.0)
            })
            .collect()
    }

    // ─── Percentiles ─────────────────────────────────────────────

    #[test]
    fn percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&sorted, 50.0), 3.0);
        assert_eq!(percentile_sorted(&sorted, 0.0), 1.0);
        assert_eq!(percentile_sorted(&sorted, 100.0), 5.0);
        assert!((percentile_sorted(&sorted, 12.5) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn percentiles_from_level() {
        let (lo, hi) = config(1).percentiles();
        assert!((lo - 2.5).abs() < 1e-12);
        assert!((hi - 97.5).abs() < 1e-12);
    }

    #[test]
    fn method_names_are_screaming_snake_case() {
        let json = serde_json::to_string(&BootstrapMethod::MatchedPairs).unwrap();
        assert_eq!(json, "\"MATCHED_PAIRS\"");
        let parsed: BootstrapMethod = serde_json::from_str("\"FORECASTS\"").unwrap();
        assert_eq!(parsed, BootstrapMethod::Forecasts);
    }

    // ─── Forecast resampling ─────────────────────────────────────

    #[test]
    fn forecast_ci_brackets_the_value() {
        let data = rows("GFS", &[0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 0.0, -0.5]);
        let refs: Vec<&StatRecord> = data.iter().collect();
        let center = metric_value(Metric::Me, refs.iter().copied());
        let mut rng = StdRng::seed_from_u64(7);
        let (lo, hi) = forecast_ci(&refs, Metric::Me, center, &config(5), &mut rng).unwrap();
        assert!(lo <= 0.0 && hi >= 0.0, "offsets {lo} {hi}");
        assert!(hi > lo);
    }

    #[test]
    fn small_groups_get_no_interval() {
        let data = rows("GFS", &[0.5, 1.0]);
        let refs: Vec<&StatRecord> = data.iter().collect();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(forecast_ci(&refs, Metric::Me, 0.75, &config(30), &mut rng).is_none());
    }

    #[test]
    fn constant_rows_give_zero_width() {
        let data = rows("GFS", &[1.0; 6]);
        let refs: Vec<&StatRecord> = data.iter().collect();
        let mut rng = StdRng::seed_from_u64(1);
        let (lo, hi) = forecast_ci(&refs, Metric::Me, 1.0, &config(3), &mut rng).unwrap();
        assert!(lo.abs() < 1e-12 && hi.abs() < 1e-12);
    }

    #[test]
    fn same_seed_same_interval() {
        let data = rows("GFS", &[0.1, 0.7, 0.3, 1.2, 0.9, 0.4]);
        let refs: Vec<&StatRecord> = data.iter().collect();
        let a = forecast_ci(&refs, Metric::Me, 0.6, &config(3), &mut StdRng::seed_from_u64(3));
        let b = forecast_ci(&refs, Metric::Me, 0.6, &config(3), &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }

    // ─── Matched pairs ───────────────────────────────────────────

    #[test]
    fn pairs_only_shared_events() {
        let gfs = rows("GFS", &[1.0, 2.0, 3.0]);
        let ec = rows("ECMWF", &[0.0, 0.0]);
        let g: Vec<&StatRecord> = gfs.iter().collect();
        let e: Vec<&StatRecord> = ec.iter().collect();
        assert_eq!(matched_pairs(&g, &e).len(), 2);
    }

    #[test]
    fn constant_difference_has_zero_width() {
        let gfs = rows("GFS", &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let ec = rows("ECMWF", &[0.5, 1.5, 2.5, 3.5, 4.5]);
        let g: Vec<&StatRecord> = gfs.iter().collect();
        let e: Vec<&StatRecord> = ec.iter().collect();
        let pairs = matched_pairs(&g, &e);
        let mut rng = StdRng::seed_from_u64(11);
        let (lo, hi) = matched_pair_ci(&pairs, Metric::Me, &config(3), &mut rng).unwrap();
        assert!(lo.abs() < 1e-9 && hi.abs() < 1e-9, "offsets {lo} {hi}");
    }
}
