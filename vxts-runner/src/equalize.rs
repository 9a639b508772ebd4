//! Sample equalization across models.
//!
//! Models are only compared on events every one of them verified. An event
//! is identified by [`EventKey`]; rows whose event is missing for any model
//! are dropped.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use tracing::{info, warn};

use vxts_core::domain::StatRecord;

/// Identity of one verification event, independent of the model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey {
    pub valid: NaiveDateTime,
    pub init: NaiveDateTime,
    pub lead_hours: u32,
    pub fcst_lev: String,
    pub fcst_thresh: String,
    pub interp_pnts: u32,
    pub vx_mask: String,
    pub fcst_var: String,
}

impl EventKey {
    pub fn of(rec: &StatRecord) -> Self {
        Self {
            valid: rec.valid,
            init: rec.init,
            lead_hours: rec.lead_hours,
            fcst_lev: rec.fcst_lev.clone(),
            fcst_thresh: rec.fcst_thresh_label(),
            interp_pnts: rec.interp_pnts,
            vx_mask: rec.vx_mask.clone(),
            fcst_var: rec.fcst_var.clone(),
        }
    }
}

/// Outcome of equalization.
#[derive(Debug)]
pub struct Equalized {
    pub records: Vec<StatRecord>,
    /// `false` when equalization was abandoned and the input returned as-is.
    pub equalized: bool,
}

/// Keep only events present for every model in `models`.
///
/// If no event is shared by all models the input is returned unchanged with
/// `equalized == false`, so the plot proceeds without sample counts.
pub fn equalize_samples(records: Vec<StatRecord>, models: &[String]) -> Equalized {
    let mut seen: BTreeMap<EventKey, BTreeSet<&str>> = BTreeMap::new();
    for rec in &records {
        seen.entry(EventKey::of(rec))
            .or_default()
            .insert(rec.model.as_str());
    }
    let shared: BTreeSet<EventKey> = seen
        .into_iter()
        .filter(|(_, present)| models.iter().all(|m| present.contains(m.as_str())))
        .map(|(key, _)| key)
        .collect();

    if shared.is_empty() {
        warn!(
            "Sample equalization failed: no event is shared by all models ({}). Plotting without equalization",
            models.join(", ")
        );
        return Equalized {
            records,
            equalized: false,
        };
    }

    let before = records.len();
    let kept: Vec<StatRecord> = records
        .into_iter()
        .filter(|r| {
            models.iter().any(|m| m == &r.model) && shared.contains(&EventKey::of(r))
        })
        .collect();
    info!(
        "Sample equalization kept {} of {before} rows ({} shared events)",
        kept.len(),
        shared.len()
    );
    Equalized {
        records: kept,
        equalized: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::sl1l2_record;

    fn models() -> Vec<String> {
        vec!["GFS".to_string(), "ECMWF".to_string()]
    }

    #[test]
    fn unshared_events_are_removed() {
        let recs = vec![
            sl1l2_record("GFS", "20240101_000000", 24, "P500", 1.0, 0.0),
            sl1l2_record("ECMWF", "20240101_000000", 24, "P500", 1.0, 0.0),
            sl1l2_record("GFS", "20240102_000000", 24, "P500", 1.0, 0.0),
        ];
        let out = equalize_samples(recs, &models());
        assert!(out.equalized);
        assert_eq!(out.records.len(), 2);
        assert!(out.records.iter().all(|r| r.valid.format("%d").to_string() == "01"));
    }

    #[test]
    fn leads_are_part_of_the_event() {
        let recs = vec![
            sl1l2_record("GFS", "20240101_000000", 24, "P500", 1.0, 0.0),
            sl1l2_record("ECMWF", "20240101_000000", 48, "P500", 1.0, 0.0),
            sl1l2_record("ECMWF", "20240101_000000", 24, "P500", 1.0, 0.0),
        ];
        let out = equalize_samples(recs, &models());
        assert_eq!(out.records.len(), 2);
    }

    #[test]
    fn nothing_shared_returns_input() {
        let recs = vec![
            sl1l2_record("GFS", "20240101_000000", 24, "P500", 1.0, 0.0),
            sl1l2_record("ECMWF", "20240102_000000", 24, "P500", 1.0, 0.0),
        ];
        let out = equalize_samples(recs, &models());
        assert!(!out.equalized);
        assert_eq!(out.records.len(), 2);
    }

    #[test]
    fn single_model_is_trivially_equalized() {
        let recs = vec![sl1l2_record("GFS", "20240101_000000", 24, "P500", 1.0, 0.0)];
        let out = equalize_samples(recs, &["GFS".to_string()]);
        assert!(out.equalized);
        assert_eq!(out.records.len(), 1);
    }
}
