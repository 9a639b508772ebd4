//! Verification metrics computed from aggregated partial sums.
//!
//! Rows of one line type aggregate into a single set of partial sums:
//! means (`FBAR`, `FOBAR`, ...) combine as TOTAL-weighted averages and
//! contingency counts add up. Every metric is a function of those sums, so
//! a group of rows, a bootstrap resample, or a single row all go through the
//! same [`Metric::compute`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use vxts_core::domain::{
    CtcCounts, LineType, NbrcntSums, PartialSums, ScalarSums, StatRecord, VectorSums,
};

use crate::config::UnitConversion;

/// How a metric's values relate to the variable's units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    /// Same quantity as the variable (affine conversion).
    Level,
    /// Difference of two values (scale only).
    Difference,
    /// Square of a difference (scale squared).
    Squared,
    Unitless,
}

macro_rules! metrics {
    ($( $variant:ident => ($name:literal, $long:literal, $lt:ident, $kind:ident) ),+ $(,)?) => {
        /// A plottable verification metric.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Metric {
            $( $variant, )+
        }

        impl Metric {
            pub const ALL: &'static [Metric] = &[ $( Metric::$variant, )+ ];

            /// Upper-case MET name.
            pub fn name(&self) -> &'static str {
                match self { $( Metric::$variant => $name, )+ }
            }

            pub fn long_name(&self) -> &'static str {
                match self { $( Metric::$variant => $long, )+ }
            }

            /// Line type the metric is computed from.
            pub fn line_type(&self) -> LineType {
                match self { $( Metric::$variant => LineType::$lt, )+ }
            }

            pub fn unit_kind(&self) -> UnitKind {
                match self { $( Metric::$variant => UnitKind::$kind, )+ }
            }
        }
    };
}

metrics! {
    Fbar => ("FBAR", "Forecast Mean", Sl1l2, Level),
    Obar => ("OBAR", "Observed Mean", Sl1l2, Level),
    Me => ("ME", "Mean Error", Sl1l2, Difference),
    Bias => ("BIAS", "Bias", Sl1l2, Difference),
    Mse => ("MSE", "Mean Squared Error", Sl1l2, Squared),
    Rmse => ("RMSE", "Root Mean Squared Error", Sl1l2, Difference),
    Bcrmse => ("BCRMSE", "Bias-Corrected Root Mean Squared Error", Sl1l2, Difference),
    Mae => ("MAE", "Mean Absolute Error", Sl1l2, Difference),
    Corr => ("CORR", "Pearson Correlation", Sl1l2, Unitless),
    Fstdev => ("FSTDEV", "Forecast Standard Deviation", Sl1l2, Difference),
    Ostdev => ("OSTDEV", "Observed Standard Deviation", Sl1l2, Difference),
    Acc => ("ACC", "Anomaly Correlation Coefficient", Sal1l2, Unitless),
    Rmsve => ("RMSVE", "Root Mean Squared Vector Error", Vl1l2, Difference),
    FbarSpeed => ("FBAR_SPEED", "Forecast Mean Wind Speed", Vl1l2, Level),
    ObarSpeed => ("OBAR_SPEED", "Observed Mean Wind Speed", Vl1l2, Level),
    SpeedErr => ("SPEED_ERR", "Difference in Mean Wind Speed", Vl1l2, Difference),
    VdiffSpeed => ("VDIFF_SPEED", "Vector Difference Speed", Vl1l2, Difference),
    Csi => ("CSI", "Critical Success Index", Ctc, Unitless),
    Pod => ("POD", "Probability of Detection", Ctc, Unitless),
    Far => ("FAR", "False Alarm Ratio", Ctc, Unitless),
    Sr => ("SR", "Success Ratio", Ctc, Unitless),
    Fbias => ("FBIAS", "Frequency Bias", Ctc, Unitless),
    Ets => ("ETS", "Equitable Threat Score", Ctc, Unitless),
    Hss => ("HSS", "Heidke Skill Score", Ctc, Unitless),
    Fss => ("FSS", "Fractions Skill Score", Nbrcnt, Unitless),
    Fbs => ("FBS", "Fractions Brier Score", Nbrcnt, Unitless),
    Afss => ("AFSS", "Asymptotic Fractions Skill Score", Nbrcnt, Unitless),
    FRate => ("F_RATE", "Forecast Event Frequency", Nbrcnt, Unitless),
    ORate => ("O_RATE", "Observed Event Frequency", Nbrcnt, Unitless),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown metric '{0}'")]
pub struct UnknownMetric(pub String);

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.name() == upper)
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Metric {
    /// Metrics that depend on observations only; every model should agree
    /// on them once samples are equalized.
    pub fn is_observation_only(&self) -> bool {
        matches!(self, Metric::Obar | Metric::ObarSpeed | Metric::ORate)
    }

    /// Evaluate the metric; NaN when the sums are of another line type or
    /// the metric is undefined for them.
    pub fn compute(&self, sums: &PartialSums) -> f64 {
        match (self.line_type(), sums) {
            (LineType::Sl1l2, PartialSums::Scalar(s)) => self.scalar(s),
            (LineType::Sal1l2, PartialSums::Anomaly(s)) => correlation(s),
            (LineType::Vl1l2, PartialSums::Vector(v)) => self.vector(v),
            (LineType::Ctc, PartialSums::Contingency(c)) => self.contingency(c),
            (LineType::Nbrcnt, PartialSums::Neighborhood(n)) => self.neighborhood(n),
            _ => f64::NAN,
        }
    }

    fn scalar(&self, s: &ScalarSums) -> f64 {
        let me = s.fbar - s.obar;
        let mse = s.ffbar + s.oobar - 2.0 * s.fobar;
        match self {
            Metric::Fbar => s.fbar,
            Metric::Obar => s.obar,
            Metric::Me | Metric::Bias => me,
            Metric::Mse => mse,
            Metric::Rmse => mse.max(0.0).sqrt(),
            Metric::Bcrmse => (mse - me * me).max(0.0).sqrt(),
            Metric::Mae => s.mae.unwrap_or(f64::NAN),
            Metric::Corr => correlation(s),
            Metric::Fstdev => (s.ffbar - s.fbar * s.fbar).max(0.0).sqrt(),
            Metric::Ostdev => (s.oobar - s.obar * s.obar).max(0.0).sqrt(),
            _ => f64::NAN,
        }
    }

    fn vector(&self, v: &VectorSums) -> f64 {
        let f_mean_speed = v.ufbar.hypot(v.vfbar);
        let o_mean_speed = v.uobar.hypot(v.vobar);
        match self {
            Metric::Rmsve => (v.uvffbar - 2.0 * v.uvfobar + v.uvoobar).max(0.0).sqrt(),
            Metric::FbarSpeed => v.f_speed_bar.unwrap_or(f_mean_speed),
            Metric::ObarSpeed => v.o_speed_bar.unwrap_or(o_mean_speed),
            Metric::SpeedErr => f_mean_speed - o_mean_speed,
            Metric::VdiffSpeed => (v.ufbar - v.uobar).hypot(v.vfbar - v.vobar),
            _ => f64::NAN,
        }
    }

    fn contingency(&self, c: &CtcCounts) -> f64 {
        let (a, b, cc, d) = (c.fy_oy, c.fy_on, c.fn_oy, c.fn_on);
        let n = a + b + cc + d;
        match self {
            Metric::Csi => ratio(a, a + b + cc),
            Metric::Pod => ratio(a, a + cc),
            Metric::Far => ratio(b, a + b),
            Metric::Sr => ratio(a, a + b),
            Metric::Fbias => ratio(a + b, a + cc),
            Metric::Ets => {
                let random_hits = ratio((a + b) * (a + cc), n);
                ratio(a - random_hits, a + b + cc - random_hits)
            }
            Metric::Hss => ratio(
                2.0 * (a * d - b * cc),
                (a + cc) * (cc + d) + (a + b) * (b + d),
            ),
            _ => f64::NAN,
        }
    }

    fn neighborhood(&self, n: &NbrcntSums) -> f64 {
        match self {
            Metric::Fss => n.fss,
            Metric::Fbs => n.fbs,
            Metric::Afss => n.afss.unwrap_or(f64::NAN),
            Metric::FRate => n.f_rate.unwrap_or(f64::NAN),
            Metric::ORate => n.o_rate.unwrap_or(f64::NAN),
            _ => f64::NAN,
        }
    }

    /// Convert a metric value to the configured display units.
    pub fn convert(&self, value: f64, conv: Option<&UnitConversion>) -> f64 {
        let Some(c) = conv else { return value };
        match self.unit_kind() {
            UnitKind::Level => value * c.scale + c.offset,
            UnitKind::Difference => value * c.scale,
            UnitKind::Squared => value * c.scale * c.scale,
            UnitKind::Unitless => value,
        }
    }

    /// Convert a difference between two metric values (CI offsets).
    pub fn convert_delta(&self, delta: f64, conv: Option<&UnitConversion>) -> f64 {
        let Some(c) = conv else { return delta };
        match self.unit_kind() {
            UnitKind::Level | UnitKind::Difference => delta * c.scale,
            UnitKind::Squared => delta * c.scale * c.scale,
            UnitKind::Unitless => delta,
        }
    }

    /// Units shown for the metric given the variable's units.
    pub fn units_label(&self, var_units: &str) -> String {
        match self.unit_kind() {
            UnitKind::Unitless => String::new(),
            UnitKind::Squared if !var_units.is_empty() => format!("{var_units}\u{00b2}"),
            _ => var_units.to_string(),
        }
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}

fn correlation(s: &ScalarSums) -> f64 {
    let cov = s.fobar - s.fbar * s.obar;
    let var_f = s.ffbar - s.fbar * s.fbar;
    let var_o = s.oobar - s.obar * s.obar;
    ratio(cov, (var_f * var_o).sqrt())
}

// ─── Aggregation of partial sums ─────────────────────────────────────

/// TOTAL-weighted accumulator for one field, tolerant of missing values.
#[derive(Default)]
struct Weighted {
    sum: f64,
    weight: f64,
}

impl Weighted {
    fn add(&mut self, value: f64, weight: f64) {
        if value.is_finite() {
            self.sum += value * weight;
            self.weight += weight;
        }
    }

    fn add_opt(&mut self, value: Option<f64>, weight: f64) {
        if let Some(v) = value {
            self.add(v, weight);
        }
    }

    fn mean(&self) -> f64 {
        ratio(self.sum, self.weight)
    }

    fn mean_opt(&self) -> Option<f64> {
        (self.weight > 0.0).then(|| self.sum / self.weight)
    }
}

/// Aggregate the partial sums of `rows`.
///
/// Returns `None` for an empty input, mixed line types, or zero total
/// weight.
pub fn aggregate_sums<'a, I>(rows: I) -> Option<PartialSums>
where
    I: IntoIterator<Item = &'a StatRecord>,
{
    let mut iter = rows.into_iter().peekable();
    let line_type = iter.peek()?.stats.line_type();
    let stats: Vec<&PartialSums> = iter.map(|r| &r.stats).collect();
    if stats.iter().any(|s| s.line_type() != line_type) {
        return None;
    }
    let total: f64 = stats
        .iter()
        .map(|s| s.total())
        .filter(|t| t.is_finite())
        .sum();
    if total <= 0.0 {
        return None;
    }

    Some(match line_type {
        LineType::Sl1l2 | LineType::Sal1l2 => {
            let mut f = [(); 6].map(|_| Weighted::default());
            for s in &stats {
                if let PartialSums::Scalar(x) | PartialSums::Anomaly(x) = s {
                    f[0].add(x.fbar, x.total);
                    f[1].add(x.obar, x.total);
                    f[2].add(x.fobar, x.total);
                    f[3].add(x.ffbar, x.total);
                    f[4].add(x.oobar, x.total);
                    f[5].add_opt(x.mae, x.total);
                }
            }
            let sums = ScalarSums {
                total,
                fbar: f[0].mean(),
                obar: f[1].mean(),
                fobar: f[2].mean(),
                ffbar: f[3].mean(),
                oobar: f[4].mean(),
                mae: f[5].mean_opt(),
            };
            if line_type == LineType::Sl1l2 {
                PartialSums::Scalar(sums)
            } else {
                PartialSums::Anomaly(sums)
            }
        }
        LineType::Vl1l2 => {
            let mut f = [(); 9].map(|_| Weighted::default());
            for s in &stats {
                if let PartialSums::Vector(v) = s {
                    f[0].add(v.ufbar, v.total);
                    f[1].add(v.vfbar, v.total);
                    f[2].add(v.uobar, v.total);
                    f[3].add(v.vobar, v.total);
                    f[4].add(v.uvfobar, v.total);
                    f[5].add(v.uvffbar, v.total);
                    f[6].add(v.uvoobar, v.total);
                    f[7].add_opt(v.f_speed_bar, v.total);
                    f[8].add_opt(v.o_speed_bar, v.total);
                }
            }
            PartialSums::Vector(VectorSums {
                total,
                ufbar: f[0].mean(),
                vfbar: f[1].mean(),
                uobar: f[2].mean(),
                vobar: f[3].mean(),
                uvfobar: f[4].mean(),
                uvffbar: f[5].mean(),
                uvoobar: f[6].mean(),
                f_speed_bar: f[7].mean_opt(),
                o_speed_bar: f[8].mean_opt(),
            })
        }
        LineType::Ctc => {
            let mut c = CtcCounts {
                total,
                fy_oy: 0.0,
                fy_on: 0.0,
                fn_oy: 0.0,
                fn_on: 0.0,
            };
            for s in &stats {
                if let PartialSums::Contingency(x) = s {
                    c.fy_oy += x.fy_oy;
                    c.fy_on += x.fy_on;
                    c.fn_oy += x.fn_oy;
                    c.fn_on += x.fn_on;
                }
            }
            PartialSums::Contingency(c)
        }
        LineType::Nbrcnt => {
            let mut f = [(); 6].map(|_| Weighted::default());
            for s in &stats {
                if let PartialSums::Neighborhood(n) = s {
                    f[0].add(n.fbs, n.total);
                    f[1].add(n.fss, n.total);
                    f[2].add_opt(n.afss, n.total);
                    f[3].add_opt(n.ufss, n.total);
                    f[4].add_opt(n.f_rate, n.total);
                    f[5].add_opt(n.o_rate, n.total);
                }
            }
            PartialSums::Neighborhood(NbrcntSums {
                total,
                fbs: f[0].mean(),
                fss: f[1].mean(),
                afss: f[2].mean_opt(),
                ufss: f[3].mean_opt(),
                f_rate: f[4].mean_opt(),
                o_rate: f[5].mean_opt(),
            })
        }
    })
}

/// Aggregate `rows` and evaluate `metric`; NaN when nothing aggregates.
pub fn metric_value<'a, I>(metric: Metric, rows: I) -> f64
where
    I: IntoIterator<Item = &'a StatRecord>,
{
    aggregate_sums(rows)
        .map(|s| metric.compute(&s))
        .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ctc_record, sl1l2_record};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn names_round_trip() {
        for m in Metric::ALL {
            assert_eq!(m.name().parse::<Metric>().unwrap(), *m);
        }
        assert_eq!("bcrmse".parse::<Metric>().unwrap(), Metric::Bcrmse);
        assert!("NOPE".parse::<Metric>().is_err());
    }

    #[test]
    fn scalar_metrics_from_constant_fields() {
        // Forecast always 3, observation always 1.
        let rows = [sl1l2_record("GFS", "20240101_000000", 24, "P500", 3.0, 1.0)];
        assert!(close(metric_value(Metric::Me, &rows), 2.0));
        assert!(close(metric_value(Metric::Bias, &rows), 2.0));
        assert!(close(metric_value(Metric::Mse, &rows), 4.0));
        assert!(close(metric_value(Metric::Rmse, &rows), 2.0));
        assert!(close(metric_value(Metric::Bcrmse, &rows), 0.0));
        assert!(close(metric_value(Metric::Mae, &rows), 2.0));
        assert!(close(metric_value(Metric::Obar, &rows), 1.0));
        assert!(close(metric_value(Metric::Fstdev, &rows), 0.0));
    }

    #[test]
    fn sums_are_total_weighted() {
        let mut a = sl1l2_record("GFS", "20240101_000000", 24, "P500", 2.0, 0.0);
        let b = sl1l2_record("GFS", "20240101_000000", 24, "P500", 6.0, 0.0);
        if let PartialSums::Scalar(s) = &mut a.stats {
            s.total = 30.0;
        }
        let sums = aggregate_sums([&a, &b]).unwrap();
        match sums {
            PartialSums::Scalar(s) => {
                assert_eq!(s.total, 40.0);
                assert!(close(s.fbar, (2.0 * 30.0 + 6.0 * 10.0) / 40.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn contingency_counts_add() {
        let rows = [
            ctc_record("GFS", "20240101_000000", ">=1", [10.0, 5.0, 5.0, 80.0]),
            ctc_record("GFS", "20240102_000000", ">=1", [10.0, 5.0, 5.0, 80.0]),
        ];
        assert!(close(metric_value(Metric::Csi, &rows), 20.0 / 30.0));
        assert!(close(metric_value(Metric::Pod, &rows), 20.0 / 30.0));
        assert!(close(metric_value(Metric::Far, &rows), 10.0 / 30.0));
        assert!(close(metric_value(Metric::Sr, &rows), 20.0 / 30.0));
        assert!(close(metric_value(Metric::Fbias, &rows), 1.0));
        let ets = metric_value(Metric::Ets, &rows);
        let hits_random = 30.0 * 30.0 / 200.0;
        assert!(close(ets, (20.0 - hits_random) / (30.0 - hits_random)));
    }

    #[test]
    fn undefined_ratios_are_nan() {
        let rows = [ctc_record("GFS", "20240101_000000", ">=1", [0.0, 0.0, 0.0, 10.0])];
        assert!(metric_value(Metric::Csi, &rows).is_nan());
    }

    #[test]
    fn wrong_line_type_is_nan() {
        let rows = [sl1l2_record("GFS", "20240101_000000", 24, "P500", 3.0, 1.0)];
        assert!(metric_value(Metric::Csi, &rows).is_nan());
        assert!(metric_value(Metric::Me, std::iter::empty()).is_nan());
    }

    #[test]
    fn unit_conversion_by_kind() {
        let kelvin_to_f = UnitConversion {
            to_units: "F".into(),
            scale: 1.8,
            offset: -459.67,
        };
        let conv = Some(&kelvin_to_f);
        assert!(close(Metric::Fbar.convert(273.15, conv), 32.0));
        assert!(close(Metric::Me.convert(1.0, conv), 1.8));
        assert!(close(Metric::Mse.convert(1.0, conv), 3.24));
        assert!(close(Metric::Csi.convert(0.5, conv), 0.5));
        assert!(close(Metric::Fbar.convert_delta(1.0, conv), 1.8));
        assert_eq!(Metric::Mse.units_label("K"), "K\u{00b2}");
        assert_eq!(Metric::Csi.units_label("K"), "");
    }

    #[test]
    fn observation_only_metrics() {
        assert!(Metric::Obar.is_observation_only());
        assert!(Metric::ORate.is_observation_only());
        assert!(!Metric::Fbar.is_observation_only());
    }
}
