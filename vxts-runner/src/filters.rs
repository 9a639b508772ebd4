//! The filter chain applied to loaded records before aggregation.
//!
//! Each step narrows the record set and, where it matters for the figure,
//! returns the display text and file-name token describing the selection.
//! Callers end the plot with a warning when a step leaves nothing.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use vxts_core::domain::{DateType, LeadSelection, StatRecord, Threshold, ThresholdError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("unknown interpolation shape '{0}'; valid values are SQUARE or CIRCLE")]
    UnknownShape(String),
    #[error(transparent)]
    Threshold(#[from] ThresholdError),
}

// ─── Level ───────────────────────────────────────────────────────────

/// Keep records whose forecast level is exactly `level`.
pub fn filter_by_level(records: Vec<StatRecord>, level: &str) -> Vec<StatRecord> {
    records.into_iter().filter(|r| r.fcst_lev == level).collect()
}

// ─── Lead ────────────────────────────────────────────────────────────

/// Title phrase and file-name token of a selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionLabel {
    pub display: String,
    pub save: String,
}

/// Keep records at the selected leads.
pub fn filter_by_lead(
    records: Vec<StatRecord>,
    leads: &LeadSelection,
) -> (Vec<StatRecord>, SelectionLabel) {
    let kept = records
        .into_iter()
        .filter(|r| leads.contains(r.lead_hours))
        .collect();
    let label = SelectionLabel {
        display: leads.display_string(),
        save: leads.save_string(),
    };
    (kept, label)
}

// ─── Date hours ──────────────────────────────────────────────────────

/// Requested hours of day that actually occur in `records`.
///
/// With no request, every hour present in the data is returned. The result
/// is sorted.
pub fn present_date_hours(records: &[StatRecord], date_type: DateType, requested: &[u32]) -> Vec<u32> {
    let present: BTreeSet<u32> = records.iter().map(|r| r.date(date_type).hour()).collect();
    if requested.is_empty() {
        return present.into_iter().collect();
    }
    let mut hours: Vec<u32> = requested
        .iter()
        .copied()
        .filter(|h| present.contains(h))
        .collect();
    hours.sort_unstable();
    hours.dedup();
    hours
}

// ─── Interpolation width ─────────────────────────────────────────────

/// Shape of the interpolation stencil, which determines its width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InterpShape {
    #[default]
    Square,
    Circle,
}

impl InterpShape {
    /// Stencil width for a point count.
    pub fn width(&self, pts: u32) -> f64 {
        match self {
            InterpShape::Square => f64::from(pts).sqrt(),
            InterpShape::Circle => f64::from(pts + 4).sqrt(),
        }
    }
}

impl FromStr for InterpShape {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SQUARE" => Ok(InterpShape::Square),
            "CIRCLE" => Ok(InterpShape::Circle),
            _ => Err(FilterError::UnknownShape(s.to_string())),
        }
    }
}

impl TryFrom<String> for InterpShape {
    type Error = FilterError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<InterpShape> for String {
    fn from(shape: InterpShape) -> Self {
        shape.to_string()
    }
}

impl fmt::Display for InterpShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InterpShape::Square => "SQUARE",
            InterpShape::Circle => "CIRCLE",
        })
    }
}

fn format_width(w: f64) -> String {
    if (w - w.round()).abs() < 1e-9 {
        format!("{}", w.round() as i64)
    } else {
        format!("{w:.1}")
    }
}

/// Keep records with a requested interpolation point count.
///
/// An empty request keeps everything and produces empty labels.
pub fn filter_by_width(
    records: Vec<StatRecord>,
    pts: &[u32],
    shape: InterpShape,
) -> (Vec<StatRecord>, SelectionLabel) {
    if pts.is_empty() {
        return (records, SelectionLabel::default());
    }
    let kept: Vec<StatRecord> = records
        .into_iter()
        .filter(|r| pts.contains(&r.interp_pnts))
        .collect();

    let widths: Vec<String> = if pts.iter().all(|&p| p == 1) {
        vec!["1".to_string()]
    } else {
        let mut w: Vec<f64> = pts.iter().map(|&p| shape.width(p)).collect();
        w.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        w.dedup();
        w.into_iter().map(format_width).collect()
    };
    let label = if widths.len() == 1 {
        SelectionLabel {
            display: format!("(Width: {})", widths[0]),
            save: format!("width{}", widths[0]),
        }
    } else {
        SelectionLabel {
            display: format!("(Widths: {})", widths.join(", ")),
            save: format!("width{}", widths.join("-")),
        }
    };
    (kept, label)
}

// ─── Threshold ───────────────────────────────────────────────────────

/// Thresholds that survived filtering, with the text used to label them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreshSelection {
    /// Operator in symbol form (`>=`) for titles.
    pub op_symbol: String,
    /// Operator in letter form (`ge`) for file names.
    pub op_letter: String,
    /// Threshold values found in the filtered data, numerically sorted.
    pub data_values: Vec<String>,
    /// Requested threshold values, numerically sorted.
    pub requested_values: Vec<String>,
}

impl ThreshSelection {
    /// `>=20, >=30` for the second title line.
    pub fn display_phrase(&self) -> String {
        self.data_values
            .iter()
            .map(|v| format!("{}{v}", self.op_symbol))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `ge20ge30` for file names, `.` replaced by `p`.
    pub fn save_phrase(&self) -> String {
        self.requested_values
            .iter()
            .map(|v| format!("{}{v}", self.op_letter))
            .collect::<String>()
            .replace('.', "p")
    }
}

fn sort_numeric(values: &mut Vec<(f64, String)>) {
    values.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    values.dedup_by(|a, b| a.1 == b.1);
}

/// Keep records whose forecast threshold matches a requested one.
///
/// Requests may be written in symbol (`>=20`) or letter (`ge20`) form. No
/// request means no threshold filtering.
pub fn filter_by_thresh(
    records: Vec<StatRecord>,
    requested: &[String],
) -> Result<(Vec<StatRecord>, Option<ThreshSelection>), FilterError> {
    let wanted: Vec<Threshold> = requested
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<Threshold>())
        .collect::<Result<_, _>>()?;
    let Some(first) = wanted.first() else {
        return Ok((records, None));
    };

    let kept: Vec<StatRecord> = records
        .into_iter()
        .filter(|r| {
            r.fcst_thresh
                .as_ref()
                .is_some_and(|t| wanted.iter().any(|w| w == t))
        })
        .collect();

    let mut data: Vec<(f64, String)> = kept
        .iter()
        .filter_map(|r| r.fcst_thresh.as_ref())
        .map(|t| (t.value, t.value_text.clone()))
        .collect();
    sort_numeric(&mut data);
    let mut req: Vec<(f64, String)> = wanted
        .iter()
        .map(|t| (t.value, t.value_text.clone()))
        .collect();
    sort_numeric(&mut req);

    let selection = ThreshSelection {
        op_symbol: first.op.symbol().to_string(),
        op_letter: first.op.letter().to_string(),
        data_values: data.into_iter().map(|(_, s)| s).collect(),
        requested_values: req.into_iter().map(|(_, s)| s).collect(),
    };
    Ok((kept, Some(selection)))
}

// ─── Models ──────────────────────────────────────────────────────────

/// Drop requested models absent from the data and rows of unrequested ones.
///
/// Returns the surviving model list in request order.
pub fn filter_models(records: Vec<StatRecord>, models: &[String]) -> (Vec<StatRecord>, Vec<String>) {
    let present: BTreeSet<&str> = records.iter().map(|r| r.model.as_str()).collect();
    let (kept_models, dropped): (Vec<String>, Vec<String>) = models
        .iter()
        .cloned()
        .partition(|m| present.contains(m.as_str()));
    if !dropped.is_empty() {
        warn!(
            "Models not found in the data and removed from the plot: {}",
            dropped.join(", ")
        );
    }
    let kept = records
        .into_iter()
        .filter(|r| kept_models.iter().any(|m| m == &r.model))
        .collect();
    (kept, kept_models)
}
