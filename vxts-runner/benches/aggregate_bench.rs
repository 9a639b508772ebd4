//! Criterion benchmarks for grouped aggregation and bootstrap intervals.
//!
//! Run with: `cargo bench -p vxts-runner`
//!
//! These benchmarks measure the performance-critical paths:
//! - Aggregation without intervals (metric computation per group)
//! - Forecast resampling and matched-pair intervals at increasing sizes

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vxts_core::domain::{DateType, PartialSums, ScalarSums, StatRecord};
use vxts_core::BootstrapSeeds;
use vxts_runner::aggregate::{aggregate, AggregateRequest, DateBin};
use vxts_runner::bootstrap::{BootstrapConfig, BootstrapMethod};
use vxts_runner::metrics::Metric;

/// Synthetic SL1L2 rows: `days` days × 4 cycles × 3 leads × `models`.
fn generate_records(models: usize, days: usize) -> Vec<StatRecord> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut out = Vec::new();
    for m in 0..models {
        for d in 0..days {
            for cycle in 0..4 {
                for lead in [24u32, 48, 72] {
                    let valid = start + Duration::days(d as i64) + Duration::hours(6 * cycle);
                    let obar = 280.0 + (d % 7) as f64;
                    let fbar = obar + 0.1 * m as f64 + 0.01 * (lead as f64 / 24.0);
                    out.push(StatRecord {
                        model: format!("M{m}"),
                        desc: "NA".into(),
                        lead_hours: lead,
                        valid,
                        init: valid - Duration::hours(i64::from(lead)),
                        fcst_var: "TMP".into(),
                        fcst_units: "K".into(),
                        fcst_lev: "Z2".into(),
                        obs_var: "TMP".into(),
                        obs_lev: "Z2".into(),
                        obtype: "ADPSFC".into(),
                        vx_mask: "CONUS".into(),
                        interp_mthd: "BILIN".into(),
                        interp_pnts: 4,
                        fcst_thresh: None,
                        obs_thresh: None,
                        stats: PartialSums::Scalar(ScalarSums {
                            total: 500.0,
                            fbar,
                            obar,
                            fobar: fbar * obar,
                            ffbar: fbar * fbar + 1.0,
                            oobar: obar * obar + 0.8,
                            mae: Some(1.1),
                        }),
                    });
                }
            }
        }
    }
    out
}

fn request(models: usize, bootstrap: Option<BootstrapConfig>) -> AggregateRequest {
    AggregateRequest {
        models: (0..models).map(|m| format!("M{m}")).collect(),
        date_type: DateType::Valid,
        date_bin: DateBin::Day,
        metric1: Metric::Bcrmse,
        metric2: Some(Metric::Me),
        bootstrap,
    }
}

/// Benchmark aggregation without confidence intervals
fn bench_aggregate_plain(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_plain");
    let seeds = BootstrapSeeds::new(42);

    for days in [31usize, 90, 365].iter() {
        let records = generate_records(3, *days);
        let req = request(3, None);
        group.bench_with_input(BenchmarkId::from_parameter(days), days, |b, _| {
            b.iter(|| {
                let _ = aggregate(black_box(&records), &req, &seeds);
            });
        });
    }

    group.finish();
}

/// Benchmark aggregation with bootstrap intervals for both methods
fn bench_aggregate_bootstrap(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_bootstrap");
    group.sample_size(10);
    let seeds = BootstrapSeeds::new(42);
    let records = generate_records(3, 31);

    for method in [BootstrapMethod::Forecasts, BootstrapMethod::MatchedPairs] {
        let req = request(
            3,
            Some(BootstrapConfig {
                nrep: 1000,
                method,
                ci_level: 0.95,
                min_samples: 1,
                seed: 42,
            }),
        );
        group.bench_function(format!("{method:?}"), |b| {
            b.iter(|| {
                let _ = aggregate(black_box(&records), &req, &seeds);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_aggregate_plain, bench_aggregate_bootstrap);
criterion_main!(benches);
