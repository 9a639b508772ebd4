//! Axis limits, ticks, and tick labels.

use chrono::{Duration, NaiveDateTime};

use crate::aggregate::DateBin;

/// Maximum number of labelled ticks on either axis.
const MAX_LABELS: usize = 10;

// ─── Y axis ──────────────────────────────────────────────────────────

/// Running y-range over the plotted series, bounded by configured limits.
///
/// Limits start at the configured bounds. Unless locked, each bound shrinks
/// to the data extreme when the data lies inside it; data beyond a bound is
/// clipped there.
#[derive(Debug, Clone)]
pub struct YLimits {
    limit_min: f64,
    limit_max: f64,
    locked: bool,
    data_min: f64,
    data_max: f64,
}

impl YLimits {
    pub fn new(limit_min: f64, limit_max: f64, locked: bool) -> Self {
        Self {
            limit_min,
            limit_max,
            locked,
            data_min: f64::INFINITY,
            data_max: f64::NEG_INFINITY,
        }
    }

    /// Include the finite values of `values`.
    pub fn observe(&mut self, values: &[f64]) {
        for v in values.iter().filter(|v| v.is_finite()) {
            self.data_min = self.data_min.min(*v);
            self.data_max = self.data_max.max(*v);
        }
    }

    /// The resolved `(min, max)` before tick rounding.
    pub fn bounds(&self) -> (f64, f64) {
        if self.locked || self.data_min > self.data_max {
            return (self.limit_min, self.limit_max);
        }
        let lo = if self.data_min > self.limit_min {
            self.data_min
        } else {
            self.limit_min
        };
        let hi = if self.data_max < self.limit_max {
            self.data_max
        } else {
            self.limit_max
        };
        (lo, hi)
    }
}

/// Resolved y axis.
#[derive(Debug, Clone, PartialEq)]
pub struct YAxis {
    pub min: f64,
    pub max: f64,
    pub ticks: Vec<f64>,
    /// One label per tick; blank strings are unlabelled ticks.
    pub labels: Vec<String>,
}

/// Step from the 1, 2, 2.5, 5 × 10^k family aiming for about 10 intervals.
pub fn nice_step(span: f64) -> f64 {
    if !(span.is_finite() && span > 0.0) {
        return 1.0;
    }
    let raw = span / 10.0;
    let magnitude = 10f64.powf(raw.log10().floor());
    [1.0, 2.0, 2.5, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|step| *step >= raw * (1.0 - 1e-12))
        .unwrap_or(10.0 * magnitude)
}

fn decimals_for(step: f64) -> usize {
    (0..=6)
        .find(|d| {
            let scaled = step * 10f64.powi(*d as i32);
            (scaled - scaled.round()).abs() < 1e-6
        })
        .unwrap_or(6)
}

impl YAxis {
    /// Round `bounds` outward to nice ticks.
    pub fn from_bounds(bounds: (f64, f64)) -> Self {
        let (mut lo, mut hi) = bounds;
        if hi < lo {
            std::mem::swap(&mut lo, &mut hi);
        }
        if (hi - lo).abs() < f64::EPSILON {
            let pad = if lo == 0.0 { 1.0 } else { lo.abs() * 0.1 };
            lo -= pad;
            hi += pad;
        }
        let step = nice_step(hi - lo);
        let first = (lo / step).floor() as i64;
        let last = (hi / step).ceil() as i64;
        let ticks: Vec<f64> = (first..=last).map(|k| k as f64 * step).collect();
        let decimals = decimals_for(step);
        let blank_alternate = ticks.len() > MAX_LABELS;
        let labels = ticks
            .iter()
            .enumerate()
            .map(|(i, t)| {
                if blank_alternate && i % 2 == 1 {
                    String::new()
                } else {
                    // avoid "-0"
                    let t = if t.abs() < step * 1e-9 { 0.0 } else { *t };
                    format!("{t:.decimals$}")
                }
            })
            .collect();
        Self {
            min: first as f64 * step,
            max: last as f64 * step,
            ticks,
            labels,
        }
    }
}

// ─── X axis ──────────────────────────────────────────────────────────

/// Resolved date axis: a tick at every date, labels thinned.
#[derive(Debug, Clone, PartialEq)]
pub struct XAxis {
    pub ticks: Vec<NaiveDateTime>,
    pub labels: Vec<String>,
}

/// Smallest positive spacing between consecutive dates.
pub fn date_increment(dates: &[NaiveDateTime]) -> Option<Duration> {
    dates
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|d| *d > Duration::zero())
        .min()
}

/// strftime pattern for date labels.
pub fn date_label_format(increment: Option<Duration>, bin: DateBin) -> &'static str {
    match bin {
        DateBin::Month => "%b %Y",
        DateBin::Year => "%Y",
        DateBin::Day => "%d %b %Y",
        DateBin::None => match increment {
            Some(inc) if inc < Duration::days(1) => "%HZ %d %b",
            _ => "%d %b %Y",
        },
    }
}

impl XAxis {
    pub fn new(dates: &[NaiveDateTime], bin: DateBin) -> Self {
        let fmt = date_label_format(date_increment(dates), bin);
        let every = dates.len().div_ceil(MAX_LABELS).max(1);
        let labels = dates
            .iter()
            .enumerate()
            .map(|(i, d)| {
                if i % every == 0 {
                    d.format(fmt).to_string()
                } else {
                    String::new()
                }
            })
            .collect();
        Self {
            ticks: dates.to_vec(),
            labels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ts;

    #[test]
    fn limits_shrink_to_data_inside_bounds() {
        let mut y = YLimits::new(-10.0, 10.0, false);
        y.observe(&[1.0, 3.0, f64::NAN]);
        y.observe(&[-2.0]);
        assert_eq!(y.bounds(), (-2.0, 3.0));
    }

    #[test]
    fn limits_clip_outside_data() {
        let mut y = YLimits::new(-10.0, 10.0, false);
        y.observe(&[-50.0, 5.0]);
        assert_eq!(y.bounds(), (-10.0, 5.0));
    }

    #[test]
    fn locked_limits_ignore_data() {
        let mut y = YLimits::new(-10.0, 10.0, true);
        y.observe(&[1.0, 2.0]);
        assert_eq!(y.bounds(), (-10.0, 10.0));
        assert_eq!(YLimits::new(0.0, 1.0, false).bounds(), (0.0, 1.0));
    }

    #[test]
    fn nice_steps() {
        assert_eq!(nice_step(8.0), 1.0);
        assert_eq!(nice_step(16.0), 2.0);
        assert_eq!(nice_step(25.0), 2.5);
        assert_eq!(nice_step(50.0), 5.0);
        assert!((nice_step(1.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn y_axis_rounds_outward() {
        let axis = YAxis::from_bounds((-2.0, 3.3));
        assert_eq!(axis.min, -2.0);
        assert_eq!(axis.max, 4.0);
        assert_eq!(axis.labels.first().map(String::as_str), Some("-2"));
        assert!(axis.ticks.contains(&0.0));
    }

    #[test]
    fn y_axis_labels_blank_alternately_when_crowded() {
        let axis = YAxis::from_bounds((0.5, 10.5));
        assert!(axis.ticks.len() > 10);
        assert_eq!(axis.labels[0], "0");
        assert_eq!(axis.labels[1], "");
    }

    #[test]
    fn flat_data_gets_padding() {
        let axis = YAxis::from_bounds((5.0, 5.0));
        assert!(axis.min < 5.0 && axis.max > 5.0);
    }

    #[test]
    fn x_labels_thin_to_ten() {
        let dates: Vec<_> = (0..25)
            .map(|i| ts("20240101_000000") + Duration::hours(12 * i))
            .collect();
        let x = XAxis::new(&dates, DateBin::None);
        assert_eq!(x.ticks.len(), 25);
        let shown: Vec<_> = x.labels.iter().filter(|l| !l.is_empty()).collect();
        assert!(shown.len() <= 10);
        assert_eq!(x.labels[0], "00Z 01 Jan");
    }

    #[test]
    fn label_formats() {
        let day = Some(Duration::days(1));
        assert_eq!(date_label_format(day, DateBin::None), "%d %b %Y");
        assert_eq!(date_label_format(Some(Duration::hours(6)), DateBin::None), "%HZ %d %b");
        assert_eq!(date_label_format(None, DateBin::Month), "%b %Y");
        assert_eq!(date_label_format(None, DateBin::Year), "%Y");
    }
}
