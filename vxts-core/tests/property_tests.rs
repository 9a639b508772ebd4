//! Property tests for core parsing and seeding.
//!
//! Uses proptest to verify:
//! 1. Symbol and letter threshold forms parse to the same threshold
//! 2. Lead strings decode to their hour component
//! 3. Bootstrap sub-seeds depend only on their inputs

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use vxts_core::domain::{format_thresh, parse_lead_hours, Threshold, ThresholdOp};
use vxts_core::BootstrapSeeds;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_op() -> impl Strategy<Value = ThresholdOp> {
    prop_oneof![
        Just(ThresholdOp::Lt),
        Just(ThresholdOp::Le),
        Just(ThresholdOp::Gt),
        Just(ThresholdOp::Ge),
        Just(ThresholdOp::Eq),
        Just(ThresholdOp::Ne),
    ]
}

fn arb_value_text() -> impl Strategy<Value = String> {
    (0u32..100_000, 0u32..4).prop_map(|(v, decimals)| match decimals {
        0 => v.to_string(),
        d => format!("{:.*}", d as usize, f64::from(v) / 10f64.powi(d as i32)),
    })
}

// ── 1. Thresholds ───────────────────────────────────────────────────

proptest! {
    /// Both notations parse to the same operator and value.
    #[test]
    fn threshold_forms_agree(op in arb_op(), value in arb_value_text()) {
        let sym: Threshold = format!("{}{value}", op.symbol()).parse().unwrap();
        let letter: Threshold = format!("{}{value}", op.letter().to_uppercase()).parse().unwrap();
        prop_assert_eq!(&sym, &letter);
        prop_assert_eq!(sym.op, op);
        prop_assert_eq!(sym.value_text.as_str(), value.as_str());
    }

    /// `format_thresh` yields forms that parse back to the input threshold.
    #[test]
    fn format_thresh_forms_parse_back(op in arb_op(), value in arb_value_text()) {
        let input = format!("{}{value}", op.letter());
        let (sym, letter) = format_thresh(&input);
        let original: Threshold = input.parse().unwrap();
        prop_assert_eq!(sym.parse::<Threshold>().unwrap(), original.clone());
        prop_assert_eq!(letter.parse::<Threshold>().unwrap(), original);
    }
}

// ── 2. Leads ────────────────────────────────────────────────────────

proptest! {
    /// `HHMMSS` with any number of hour digits keeps only the hours.
    #[test]
    fn lead_hours_ignore_minutes_and_seconds(hours in 0u32..1000, mm in 0u32..60, ss in 0u32..60) {
        let text = format!("{hours:02}{mm:02}{ss:02}");
        prop_assert_eq!(parse_lead_hours(&text), Some(hours));
    }

    #[test]
    fn lead_rejects_non_digits(s in "[0-9]{0,3}[A-Za-z_:][0-9]{0,4}") {
        prop_assert_eq!(parse_lead_hours(&s), None);
    }
}

// ── 3. Seeding ──────────────────────────────────────────────────────

proptest! {
    /// Sub-seeds are a pure function of master seed, group and stream.
    #[test]
    fn sub_seed_is_pure(master in any::<u64>(), day in 0i64..3650, stream in 0u64..4) {
        let date = NaiveDate::from_ymd_opt(2015, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(day);
        let a = BootstrapSeeds::new(master);
        let b = BootstrapSeeds::new(master);
        prop_assert_eq!(a.sub_seed("GFS", date, stream), b.sub_seed("GFS", date, stream));
        prop_assert_ne!(a.sub_seed("GFS", date, stream), a.sub_seed("GFS", date, stream + 1));
    }
}
