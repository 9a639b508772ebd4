//! Text for titles, legends, and axis labels.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use vxts_core::domain::{DateType, LevelInfo};

use crate::config::DomainSpec;
use crate::metrics::Metric;

/// Join items as `a`, `a and b`, or `a, b, and c`.
pub fn list_items<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [one] => one.as_ref().to_string(),
        [a, b] => format!("{} and {}", a.as_ref(), b.as_ref()),
        [head @ .., last] => {
            let head: Vec<&str> = head.iter().map(|s| s.as_ref()).collect();
            format!("{}, and {}", head.join(", "), last.as_ref())
        }
    }
}

/// Legend formatting for a series mean.
pub fn format_mean(mean: f64) -> String {
    if mean.abs() < 1e4 {
        format!("{mean:.2}")
    } else {
        format_scientific(mean)
    }
}

/// `1.23E+04` style with a signed two-digit exponent.
fn format_scientific(v: f64) -> String {
    let s = format!("{v:.2E}");
    match s.split_once('E') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}E{sign}{digits:0>2}")
        }
        None => s,
    }
}

/// Hours phrase for the third title line: `00Z and 12Z`.
pub fn date_hours_phrase(hours: &[u32]) -> String {
    let items: Vec<String> = hours.iter().map(|h| format!("{h:02}Z")).collect();
    list_items(&items)
}

/// Domain name for titles and its file-name token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainInfo {
    pub display: String,
    pub save: String,
}

/// Translate a verification mask through the configured domain table,
/// falling back to the mask itself.
pub fn domain_info(vx_mask: &str, domains: &BTreeMap<String, DomainSpec>) -> DomainInfo {
    let display = domains
        .get(vx_mask)
        .map(|d| d.long_name.clone())
        .unwrap_or_else(|| vx_mask.to_string());
    DomainInfo {
        display,
        save: vx_mask.to_lowercase().replace('/', "_"),
    }
}

/// Y-axis label: metric names with the units of the first metric that
/// carries units.
pub fn y_label(metric1: Metric, metric2: Option<Metric>, var_units: &str) -> String {
    let names: Vec<&str> = std::iter::once(metric1)
        .chain(metric2)
        .map(|m| m.name())
        .collect();
    let units = std::iter::once(metric1)
        .chain(metric2)
        .map(|m| m.units_label(var_units))
        .find(|u| !u.is_empty());
    match units {
        Some(u) => format!("{} ({u})", list_items(&names)),
        None => list_items(&names),
    }
}

/// Everything the three title lines are built from.
#[derive(Debug, Clone)]
pub struct TitleParts<'a> {
    pub metric1: Metric,
    pub metric2: Option<Metric>,
    /// Interpolation width text, e.g. `(Width: 3)`; empty when unused.
    pub width: &'a str,
    pub level: &'a LevelInfo,
    pub var_long_name: &'a str,
    /// Threshold phrase, e.g. `>=2.54, >=25.4`.
    pub thresholds: Option<&'a str>,
    pub units: &'a str,
    pub domain: &'a str,
    pub date_type: DateType,
    pub date_hours: &'a [u32],
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub lead_phrase: &'a str,
}

/// The centered three-line plot title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Titles {
    pub lines: [String; 3],
}

impl Titles {
    pub fn new(p: &TitleParts<'_>) -> Self {
        let mut line1 = match p.metric2 {
            Some(m2) => format!("{} and {}", p.metric1.long_name(), m2.long_name()),
            None => p.metric1.long_name().to_string(),
        };
        if !p.width.is_empty() {
            line1.push(' ');
            line1.push_str(p.width);
        }

        let units = if p.units.is_empty() { "unitless" } else { p.units };
        let inside = match p.thresholds {
            Some(t) if !t.is_empty() => format!("{t} {units}"),
            _ => units.to_string(),
        };
        let line2 = format!(
            "{}{} ({inside}), {}",
            p.level.display, p.var_long_name, p.domain
        );

        let line3 = format!(
            "{} {} {} to {}, {}",
            p.date_type.title_word(),
            date_hours_phrase(p.date_hours),
            p.start.format("%d %b %Y"),
            p.end.format("%d %b %Y"),
            p.lead_phrase
        );
        Self {
            lines: [line1, line2, line3],
        }
    }
}
