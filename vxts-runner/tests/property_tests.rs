//! Property tests for pipeline invariants.
//!
//! Uses proptest to verify:
//! 1. Equalization leaves every model with the same event set
//! 2. Running means stay within the range of their window
//! 3. Bootstrap intervals bracket the observed value
//! 4. Aggregation is deterministic under a fixed seed

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use vxts_core::domain::{DateType, PartialSums, ScalarSums, StatRecord};
use vxts_core::BootstrapSeeds;
use vxts_runner::aggregate::{aggregate, AggregateRequest, DateBin};
use vxts_runner::bootstrap::{forecast_ci, BootstrapConfig, BootstrapMethod};
use vxts_runner::equalize::{equalize_samples, EventKey};
use vxts_runner::metrics::{metric_value, Metric};
use vxts_runner::pivot::PivotTable;

fn base_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn record(model: &str, step: u32, fbar: f64, obar: f64) -> StatRecord {
    let valid = base_date() + Duration::hours(12 * i64::from(step));
    StatRecord {
        model: model.to_string(),
        desc: "NA".to_string(),
        lead_hours: 24,
        valid,
        init: valid - Duration::hours(24),
        fcst_var: "TMP".to_string(),
        fcst_units: "K".to_string(),
        fcst_lev: "Z2".to_string(),
        obs_var: "TMP".to_string(),
        obs_lev: "Z2".to_string(),
        obtype: "ADPSFC".to_string(),
        vx_mask: "CONUS".to_string(),
        interp_mthd: "BILIN".to_string(),
        interp_pnts: 4,
        fcst_thresh: None,
        obs_thresh: None,
        stats: PartialSums::Scalar(ScalarSums {
            total: 25.0,
            fbar,
            obar,
            fobar: fbar * obar,
            ffbar: fbar * fbar,
            oobar: obar * obar,
            mae: Some((fbar - obar).abs()),
        }),
    }
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_bias() -> impl Strategy<Value = f64> {
    (-5.0..5.0_f64).prop_map(|b| (b * 100.0).round() / 100.0)
}

/// Per model: the set of steps it reports, each with a bias.
fn arb_model_steps() -> impl Strategy<Value = Vec<Vec<(u32, f64)>>> {
    prop::collection::vec(
        prop::collection::btree_map(0u32..12, arb_bias(), 1..10)
            .prop_map(|m| m.into_iter().collect::<Vec<_>>()),
        2..4,
    )
}

fn build(steps: &[Vec<(u32, f64)>]) -> (Vec<StatRecord>, Vec<String>) {
    let models: Vec<String> = (0..steps.len()).map(|i| format!("M{i}")).collect();
    let records = steps
        .iter()
        .zip(&models)
        .flat_map(|(s, m)| {
            s.iter()
                .map(move |(step, bias)| record(m, *step, 280.0 + bias, 280.0))
        })
        .collect();
    (records, models)
}

// ── 1. Equalization ─────────────────────────────────────────────────

proptest! {
    /// After a successful equalization every model has exactly the same events.
    #[test]
    fn equalized_models_share_events(steps in arb_model_steps()) {
        let (records, models) = build(&steps);
        let total = records.len();
        let eq = equalize_samples(records, &models);
        if eq.equalized {
            let sets: Vec<BTreeSet<EventKey>> = models
                .iter()
                .map(|m| eq.records.iter().filter(|r| &r.model == m).map(EventKey::of).collect())
                .collect();
            for s in &sets[1..] {
                prop_assert_eq!(s, &sets[0]);
            }
            prop_assert!(!sets[0].is_empty());
        } else {
            prop_assert_eq!(eq.records.len(), total);
        }
    }
}

// ── 2. Running mean ─────────────────────────────────────────────────

proptest! {
    /// Each running-mean point lies between the min and max of its window.
    #[test]
    fn running_mean_within_window(values in prop::collection::vec(-100.0..100.0_f64, 1..30), window in 1usize..6) {
        let models = vec!["A".to_string()];
        let table = PivotTable::from_triples(
            &models,
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (base_date() + Duration::days(i as i64), "A", *v)),
        );
        let smoothed = table.running_mean(window).column("A").unwrap();
        for (i, s) in smoothed.iter().enumerate() {
            let lo = i + 1 - window.min(i + 1);
            let win = &values[lo..=i];
            let min = win.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = win.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(*s >= min - 1e-9 && *s <= max + 1e-9);
        }
    }
}

// ── 3. Bootstrap ────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Forecast-resampling offsets put the value inside its interval.
    #[test]
    fn forecast_interval_brackets_value(biases in prop::collection::vec(arb_bias(), 5..20), seed in 0u64..1000) {
        let rows: Vec<StatRecord> = biases
            .iter()
            .enumerate()
            .map(|(i, b)| record("GFS", i as u32, 280.0 + b, 280.0))
            .collect();
        let refs: Vec<&StatRecord> = rows.iter().collect();
        let config = BootstrapConfig {
            nrep: 200,
            method: BootstrapMethod::Forecasts,
            ci_level: 0.9,
            min_samples: 1,
            seed,
        };
        let center = metric_value(Metric::Me, refs.iter().copied());
        let mut rng = StdRng::seed_from_u64(seed);
        let (lo, hi) = forecast_ci(&refs, Metric::Me, center, &config, &mut rng).unwrap();
        prop_assert!(lo <= 1e-9, "lower offset {lo} should not be above the value");
        prop_assert!(hi >= -1e-9, "upper offset {hi} should not be below the value");
    }
}

// ── 4. Determinism ──────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// The same records and seed give identical aggregated rows.
    #[test]
    fn aggregation_is_deterministic(steps in arb_model_steps(), seed in 0u64..1000) {
        let (records, models) = build(&steps);
        let request = AggregateRequest {
            models,
            date_type: DateType::Valid,
            date_bin: DateBin::Day,
            metric1: Metric::Me,
            metric2: Some(Metric::Rmse),
            bootstrap: Some(BootstrapConfig {
                nrep: 50,
                method: BootstrapMethod::Forecasts,
                ci_level: 0.95,
                min_samples: 1,
                seed,
            }),
        };
        let seeds = BootstrapSeeds::new(seed);
        let a = aggregate(&records, &request, &seeds).unwrap();
        let b = aggregate(&records, &request, &seeds).unwrap();
        prop_assert_eq!(a, b);
    }
}
