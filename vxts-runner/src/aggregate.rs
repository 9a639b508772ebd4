//! Grouped aggregation of statistics rows into plotted values.
//!
//! Rows are grouped by (model, date), where the date is the requested date
//! type optionally truncated to a day, month, or year. Each group yields a
//! sample count, the metric values, and optional bootstrap offsets. Groups
//! are evaluated in parallel; the output is ordered by model list position
//! and date regardless of scheduling.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use vxts_core::domain::{DateType, StatRecord};
use vxts_core::BootstrapSeeds;

use crate::bootstrap::{forecast_ci, matched_pair_ci, matched_pairs, BootstrapConfig, BootstrapMethod};
use crate::metrics::{metric_value, Metric};

// ─── Date binning ────────────────────────────────────────────────────

/// Calendar bin applied to dates before grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DateBin {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "D")]
    Day,
    #[serde(rename = "M")]
    Month,
    #[serde(rename = "Y")]
    Year,
}

impl DateBin {
    /// Start of the bin containing `date`.
    pub fn bin(&self, date: NaiveDateTime) -> NaiveDateTime {
        let day = date.date();
        let start = match self {
            DateBin::None => return date,
            DateBin::Day => day,
            DateBin::Month => day.with_day(1).unwrap_or(day),
            DateBin::Year => NaiveDate::from_ymd_opt(day.year(), 1, 1).unwrap_or(day),
        };
        start.and_hms_opt(0, 0, 0).unwrap_or(date)
    }
}

// ─── Request / result types ──────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("no models to aggregate")]
    NoModels,
    #[error("confidence level {0} is outside (0, 1)")]
    InvalidCiLevel(f64),
}

/// What to compute for every (model, date) group.
#[derive(Debug, Clone)]
pub struct AggregateRequest {
    pub models: Vec<String>,
    pub date_type: DateType,
    pub date_bin: DateBin,
    pub metric1: Metric,
    pub metric2: Option<Metric>,
    /// `None` disables confidence intervals.
    pub bootstrap: Option<BootstrapConfig>,
}

/// One aggregated group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRow {
    pub model: String,
    pub date: NaiveDateTime,
    /// Number of rows aggregated.
    pub count: usize,
    pub metric1: f64,
    pub metric2: Option<f64>,
    /// Signed offsets `(lower, upper)` from `metric1`.
    pub ci1: Option<(f64, f64)>,
    pub ci2: Option<(f64, f64)>,
}

type GroupKey = (usize, NaiveDateTime);

/// Aggregate `records` per (model, date) group.
///
/// Rows of models outside `request.models` are ignored. Groups whose first
/// metric is not finite are dropped.
pub fn aggregate(
    records: &[StatRecord],
    request: &AggregateRequest,
    seeds: &BootstrapSeeds,
) -> Result<Vec<AggregatedRow>, AggregateError> {
    if request.models.is_empty() {
        return Err(AggregateError::NoModels);
    }
    if let Some(bs) = &request.bootstrap {
        if !(bs.ci_level > 0.0 && bs.ci_level < 1.0) {
            return Err(AggregateError::InvalidCiLevel(bs.ci_level));
        }
    }

    let mut groups: BTreeMap<GroupKey, Vec<&StatRecord>> = BTreeMap::new();
    for rec in records {
        let Some(idx) = request.models.iter().position(|m| m == &rec.model) else {
            continue;
        };
        let date = request.date_bin.bin(rec.date(request.date_type));
        groups.entry((idx, date)).or_default().push(rec);
    }
    let groups: Vec<(GroupKey, Vec<&StatRecord>)> = groups.into_iter().collect();
    debug!("Aggregating {} groups from {} rows", groups.len(), records.len());

    let rows: Vec<AggregatedRow> = groups
        .par_iter()
        .filter_map(|((idx, date), rows)| {
            let model = &request.models[*idx];
            let metric1 = metric_value(request.metric1, rows.iter().copied());
            if !metric1.is_finite() {
                return None;
            }
            let metric2 = request
                .metric2
                .map(|m| metric_value(m, rows.iter().copied()));

            let (ci1, ci2) = match &request.bootstrap {
                None => (None, None),
                Some(bs) => {
                    let ci = |metric: Metric, center: f64, stream: u64| {
                        let mut rng = seeds.rng_for(model, *date, stream);
                        match bs.method {
                            BootstrapMethod::Forecasts => {
                                forecast_ci(rows, metric, center, bs, &mut rng)
                            }
                            BootstrapMethod::MatchedPairs if *idx == 0 => None,
                            BootstrapMethod::MatchedPairs => {
                                let pairs = matched_pairs(rows, group_rows(&groups, (0, *date)));
                                matched_pair_ci(&pairs, metric, bs, &mut rng)
                            }
                        }
                    };
                    let ci1 = ci(request.metric1, metric1, 0);
                    let ci2 = match (request.metric2, metric2) {
                        (Some(m), Some(v)) => ci(m, v, 1),
                        _ => None,
                    };
                    (ci1, ci2)
                }
            };

            Some(AggregatedRow {
                model: model.clone(),
                date: *date,
                count: rows.len(),
                metric1,
                metric2,
                ci1,
                ci2,
            })
        })
        .collect();

    Ok(rows)
}

fn group_rows<'g, 'r>(
    groups: &'g [(GroupKey, Vec<&'r StatRecord>)],
    key: GroupKey,
) -> &'g [&'r StatRecord] {
    groups
        .binary_search_by(|(k, _)| k.cmp(&key))
        .map(|i| groups[i].1.as_slice())
        .unwrap_or(&[])
}

/// Drop dates for which any model in `models` has no aggregated row.
pub fn keep_shared_dates(rows: Vec<AggregatedRow>, models: &[String]) -> Vec<AggregatedRow> {
    let mut present: BTreeMap<NaiveDateTime, BTreeSet<&str>> = BTreeMap::new();
    for row in &rows {
        present.entry(row.date).or_default().insert(row.model.as_str());
    }
    let shared: BTreeSet<NaiveDateTime> = present
        .into_iter()
        .filter(|(_, m)| models.iter().all(|name| m.contains(name.as_str())))
        .map(|(d, _)| d)
        .collect();
    rows.into_iter()
        .filter(|r| shared.contains(&r.date))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sl1l2_record, ts};

    fn request(models: &[&str]) -> AggregateRequest {
        AggregateRequest {
            models: models.iter().map(|s| s.to_string()).collect(),
            date_type: DateType::Valid,
            date_bin: DateBin::None,
            metric1: Metric::Me,
            metric2: Some(Metric::Rmse),
            bootstrap: None,
        }
    }

    #[test]
    fn bins_truncate_dates() {
        let d = ts("20240317_120000");
        assert_eq!(DateBin::None.bin(d), d);
        assert_eq!(DateBin::Day.bin(d), ts("20240317_000000"));
        assert_eq!(DateBin::Month.bin(d), ts("20240301_000000"));
        assert_eq!(DateBin::Year.bin(d), ts("20240101_000000"));
    }

    #[test]
    fn date_bin_serde_names() {
        #[derive(Deserialize)]
        struct Wrap {
            bin: DateBin,
        }
        let w: Wrap = toml::from_str("bin = \"M\"").unwrap();
        assert_eq!(w.bin, DateBin::Month);
        let w: Wrap = toml::from_str("bin = \"\"").unwrap();
        assert_eq!(w.bin, DateBin::None);
    }

    #[test]
    fn groups_by_model_and_date_in_model_order() {
        let recs = vec![
            sl1l2_record("GFS", "20240101_000000", 24, "P500", 2.0, 1.0),
            sl1l2_record("ECMWF", "20240101_000000", 24, "P500", 1.5, 1.0),
            sl1l2_record("GFS", "20240101_000000", 48, "P500", 4.0, 1.0),
            sl1l2_record("GFS", "20240102_000000", 24, "P500", 1.0, 1.0),
        ];
        let rows = aggregate(&recs, &request(&["ECMWF", "GFS"]), &BootstrapSeeds::new(1)).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].model, "ECMWF");
        assert_eq!(rows[1].model, "GFS");
        assert_eq!(rows[1].count, 2);
        assert!((rows[1].metric1 - 2.0).abs() < 1e-12);
        assert_eq!(rows[2].date, ts("20240102_000000"));
        assert!(rows.iter().all(|r| r.ci1.is_none()));
    }

    #[test]
    fn monthly_bins_merge_days() {
        let recs = vec![
            sl1l2_record("GFS", "20240101_000000", 24, "P500", 2.0, 1.0),
            sl1l2_record("GFS", "20240131_120000", 24, "P500", 2.0, 1.0),
            sl1l2_record("GFS", "20240201_000000", 24, "P500", 2.0, 1.0),
        ];
        let mut req = request(&["GFS"]);
        req.date_bin = DateBin::Month;
        let rows = aggregate(&recs, &req, &BootstrapSeeds::new(1)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].count, 2);
    }

    #[test]
    fn matched_pairs_skip_reference_model() {
        let mut recs = Vec::new();
        for lead in [0, 6, 12, 18] {
            recs.push(sl1l2_record("GFS", "20240101_000000", lead, "P500", 2.0 + lead as f64, 1.0));
            recs.push(sl1l2_record("ECMWF", "20240101_000000", lead, "P500", 1.0, 1.0));
        }
        let mut req = request(&["GFS", "ECMWF"]);
        req.bootstrap = Some(BootstrapConfig {
            nrep: 50,
            min_samples: 2,
            ..BootstrapConfig::default()
        });
        let rows = aggregate(&recs, &req, &BootstrapSeeds::new(9)).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].ci1.is_none());
        assert!(rows[1].ci1.is_some());
        assert!(rows[1].ci2.is_some());
    }

    #[test]
    fn bootstrap_is_reproducible() {
        let recs: Vec<StatRecord> = (0..6)
            .map(|i| sl1l2_record("GFS", "20240101_000000", i * 6, "P500", 1.0 + i as f64, 1.0))
            .collect();
        let mut req = request(&["GFS"]);
        req.bootstrap = Some(BootstrapConfig {
            nrep: 100,
            method: BootstrapMethod::Forecasts,
            min_samples: 3,
            ..BootstrapConfig::default()
        });
        let a = aggregate(&recs, &req, &BootstrapSeeds::new(5)).unwrap();
        let b = aggregate(&recs, &req, &BootstrapSeeds::new(5)).unwrap();
        assert_eq!(a, b);
        assert!(a[0].ci1.is_some());
    }

    #[test]
    fn invalid_ci_level_is_rejected() {
        let mut req = request(&["GFS"]);
        req.bootstrap = Some(BootstrapConfig {
            ci_level: 1.5,
            ..BootstrapConfig::default()
        });
        assert!(matches!(
            aggregate(&[], &req, &BootstrapSeeds::new(1)),
            Err(AggregateError::InvalidCiLevel(_))
        ));
        assert!(matches!(
            aggregate(&[], &request(&[]), &BootstrapSeeds::new(1)),
            Err(AggregateError::NoModels)
        ));
    }

    #[test]
    fn shared_dates_only() {
        let recs = vec![
            sl1l2_record("GFS", "20240101_000000", 24, "P500", 2.0, 1.0),
            sl1l2_record("ECMWF", "20240101_000000", 24, "P500", 1.5, 1.0),
            sl1l2_record("GFS", "20240102_000000", 24, "P500", 1.0, 1.0),
        ];
        let models = vec!["GFS".to_string(), "ECMWF".to_string()];
        let req = request(&["GFS", "ECMWF"]);
        let rows = aggregate(&recs, &req, &BootstrapSeeds::new(1)).unwrap();
        let kept = keep_shared_dates(rows, &models);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|r| r.date == ts("20240101_000000")));
    }
}
