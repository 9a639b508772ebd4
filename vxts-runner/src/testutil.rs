//! Record builders shared by the unit tests.

use chrono::{Duration, NaiveDateTime};

use vxts_core::domain::{parse_met_timestamp, CtcCounts, PartialSums, ScalarSums, StatRecord};

pub fn ts(s: &str) -> NaiveDateTime {
    parse_met_timestamp(s).unwrap()
}

fn base(model: &str, valid: &str, lead: u32, lev: &str, stats: PartialSums) -> StatRecord {
    let valid = ts(valid);
    StatRecord {
        model: model.to_string(),
        desc: "NA".to_string(),
        lead_hours: lead,
        valid,
        init: valid - Duration::hours(i64::from(lead)),
        fcst_var: "HGT".to_string(),
        fcst_units: "gpm".to_string(),
        fcst_lev: lev.to_string(),
        obs_var: "HGT".to_string(),
        obs_lev: lev.to_string(),
        obtype: "ADPUPA".to_string(),
        vx_mask: "G004/NHX".to_string(),
        interp_mthd: "NEAREST".to_string(),
        interp_pnts: 1,
        fcst_thresh: None,
        obs_thresh: None,
        stats,
    }
}

/// SL1L2 row of 10 pairs where every forecast is `fbar` and every
/// observation `obar`.
pub fn sl1l2_record(model: &str, valid: &str, lead: u32, lev: &str, fbar: f64, obar: f64) -> StatRecord {
    base(
        model,
        valid,
        lead,
        lev,
        PartialSums::Scalar(ScalarSums {
            total: 10.0,
            fbar,
            obar,
            fobar: fbar * obar,
            ffbar: fbar * fbar,
            oobar: obar * obar,
            mae: Some((fbar - obar).abs()),
        }),
    )
}

/// CTC row with counts `[fy_oy, fy_on, fn_oy, fn_on]`.
pub fn ctc_record(model: &str, valid: &str, thresh: &str, counts: [f64; 4]) -> StatRecord {
    let [fy_oy, fy_on, fn_oy, fn_on] = counts;
    let mut rec = base(
        model,
        valid,
        24,
        "A24",
        PartialSums::Contingency(CtcCounts {
            total: fy_oy + fy_on + fn_oy + fn_on,
            fy_oy,
            fy_on,
            fn_oy,
            fn_on,
        }),
    );
    rec.fcst_var = "APCP_24".to_string();
    rec.obs_var = "APCP_24".to_string();
    rec.fcst_thresh = thresh.parse().ok();
    rec.obs_thresh = thresh.parse().ok();
    rec
}
