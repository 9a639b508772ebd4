//! One verification statistics row and its line-type partial sums.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::date_type::DateType;
use super::lead::parse_lead_hours;
use super::line_type::LineType;
use super::threshold::{Threshold, ThresholdError};

/// Errors raised while building a record from named columns.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("missing column {0}")]
    MissingColumn(&'static str),
    #[error("column {column}: '{value}' is not a number")]
    BadNumber { column: &'static str, value: String },
    #[error("column {column}: '{value}' is not a timestamp")]
    BadTimestamp { column: &'static str, value: String },
    #[error("column FCST_LEAD: '{0}' is not a lead time")]
    BadLead(String),
    #[error(transparent)]
    Threshold(#[from] ThresholdError),
    #[error("line type {found} does not match requested {expected}")]
    LineTypeMismatch { expected: LineType, found: String },
}

/// SL1L2 / SAL1L2 partial sums (anomalies use the same layout).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalarSums {
    pub total: f64,
    pub fbar: f64,
    pub obar: f64,
    pub fobar: f64,
    pub ffbar: f64,
    pub oobar: f64,
    pub mae: Option<f64>,
}

/// VL1L2 partial sums.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VectorSums {
    pub total: f64,
    pub ufbar: f64,
    pub vfbar: f64,
    pub uobar: f64,
    pub vobar: f64,
    pub uvfobar: f64,
    pub uvffbar: f64,
    pub uvoobar: f64,
    pub f_speed_bar: Option<f64>,
    pub o_speed_bar: Option<f64>,
}

/// CTC 2x2 contingency table counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CtcCounts {
    pub total: f64,
    pub fy_oy: f64,
    pub fy_on: f64,
    pub fn_oy: f64,
    pub fn_on: f64,
}

/// NBRCNT neighborhood statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NbrcntSums {
    pub total: f64,
    pub fbs: f64,
    pub fss: f64,
    pub afss: Option<f64>,
    pub ufss: Option<f64>,
    pub f_rate: Option<f64>,
    pub o_rate: Option<f64>,
}

/// Line-type specific statistics of a record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PartialSums {
    Scalar(ScalarSums),
    Anomaly(ScalarSums),
    Vector(VectorSums),
    Contingency(CtcCounts),
    Neighborhood(NbrcntSums),
}

impl PartialSums {
    pub fn line_type(&self) -> LineType {
        match self {
            PartialSums::Scalar(_) => LineType::Sl1l2,
            PartialSums::Anomaly(_) => LineType::Sal1l2,
            PartialSums::Vector(_) => LineType::Vl1l2,
            PartialSums::Contingency(_) => LineType::Ctc,
            PartialSums::Neighborhood(_) => LineType::Nbrcnt,
        }
    }

    /// Number of matched pairs behind the row.
    pub fn total(&self) -> f64 {
        match self {
            PartialSums::Scalar(s) | PartialSums::Anomaly(s) => s.total,
            PartialSums::Vector(v) => v.total,
            PartialSums::Contingency(c) => c.total,
            PartialSums::Neighborhood(n) => n.total,
        }
    }

    /// Read the line-type columns through `get` (column name to raw text).
    pub fn from_columns<'a, F>(line_type: LineType, get: F) -> Result<Self, RecordError>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let cols = Columns { get: &get };
        Ok(match line_type {
            LineType::Sl1l2 => PartialSums::Scalar(ScalarSums {
                total: cols.required("TOTAL")?,
                fbar: cols.required("FBAR")?,
                obar: cols.required("OBAR")?,
                fobar: cols.required("FOBAR")?,
                ffbar: cols.required("FFBAR")?,
                oobar: cols.required("OOBAR")?,
                mae: cols.optional("MAE")?,
            }),
            LineType::Sal1l2 => PartialSums::Anomaly(ScalarSums {
                total: cols.required("TOTAL")?,
                fbar: cols.required("FABAR")?,
                obar: cols.required("OABAR")?,
                fobar: cols.required("FOABAR")?,
                ffbar: cols.required("FFABAR")?,
                oobar: cols.required("OOABAR")?,
                mae: cols.optional("MAE")?,
            }),
            LineType::Vl1l2 => PartialSums::Vector(VectorSums {
                total: cols.required("TOTAL")?,
                ufbar: cols.required("UFBAR")?,
                vfbar: cols.required("VFBAR")?,
                uobar: cols.required("UOBAR")?,
                vobar: cols.required("VOBAR")?,
                uvfobar: cols.required("UVFOBAR")?,
                uvffbar: cols.required("UVFFBAR")?,
                uvoobar: cols.required("UVOOBAR")?,
                f_speed_bar: cols.optional("F_SPEED_BAR")?,
                o_speed_bar: cols.optional("O_SPEED_BAR")?,
            }),
            LineType::Ctc => PartialSums::Contingency(CtcCounts {
                total: cols.required("TOTAL")?,
                fy_oy: cols.required("FY_OY")?,
                fy_on: cols.required("FY_ON")?,
                fn_oy: cols.required("FN_OY")?,
                fn_on: cols.required("FN_ON")?,
            }),
            LineType::Nbrcnt => PartialSums::Neighborhood(NbrcntSums {
                total: cols.required("TOTAL")?,
                fbs: cols.required("FBS")?,
                fss: cols.required("FSS")?,
                afss: cols.optional("AFSS")?,
                ufss: cols.optional("UFSS")?,
                f_rate: cols.optional("F_RATE")?,
                o_rate: cols.optional("O_RATE")?,
            }),
        })
    }
}

struct Columns<'g, F> {
    get: &'g F,
}

impl<'a, 'g, F> Columns<'g, F>
where
    F: Fn(&str) -> Option<&'a str>,
{
    /// Required numeric column; `NA` reads as NaN.
    fn required(&self, name: &'static str) -> Result<f64, RecordError> {
        let raw = (self.get)(name).ok_or(RecordError::MissingColumn(name))?;
        parse_number(name, raw).map(|v| v.unwrap_or(f64::NAN))
    }

    /// Optional numeric column; absent or `NA` reads as `None`.
    fn optional(&self, name: &'static str) -> Result<Option<f64>, RecordError> {
        match (self.get)(name) {
            Some(raw) => parse_number(name, raw),
            None => Ok(None),
        }
    }

    fn text(&self, name: &'static str) -> Result<&'a str, RecordError> {
        (self.get)(name)
            .map(str::trim)
            .ok_or(RecordError::MissingColumn(name))
    }
}

fn parse_number(column: &'static str, raw: &str) -> Result<Option<f64>, RecordError> {
    let t = raw.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("NA") {
        return Ok(None);
    }
    t.parse::<f64>()
        .map(Some)
        .map_err(|_| RecordError::BadNumber {
            column,
            value: raw.to_string(),
        })
}

/// Parse `YYYYMMDD_HHMMSS` (MET) or `YYYY-MM-DD HH:MM:SS`.
pub fn parse_met_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let t = raw.trim();
    NaiveDateTime::parse_from_str(t, "%Y%m%d_%H%M%S")
        .or_else(|_| NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

/// One row of a MET statistics file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatRecord {
    pub model: String,
    pub desc: String,
    pub lead_hours: u32,
    pub valid: NaiveDateTime,
    pub init: NaiveDateTime,
    pub fcst_var: String,
    pub fcst_units: String,
    pub fcst_lev: String,
    pub obs_var: String,
    pub obs_lev: String,
    pub obtype: String,
    pub vx_mask: String,
    pub interp_mthd: String,
    pub interp_pnts: u32,
    pub fcst_thresh: Option<Threshold>,
    pub obs_thresh: Option<Threshold>,
    pub stats: PartialSums,
}

impl StatRecord {
    /// Build a record from named columns, requiring `line_type` in `LINE_TYPE`.
    pub fn from_columns<'a, F>(line_type: LineType, get: F) -> Result<Self, RecordError>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let cols = Columns { get: &get };

        let found = cols.text("LINE_TYPE")?;
        if !found.eq_ignore_ascii_case(line_type.as_str()) {
            return Err(RecordError::LineTypeMismatch {
                expected: line_type,
                found: found.to_string(),
            });
        }

        let lead_raw = cols.text("FCST_LEAD")?;
        let lead_hours =
            parse_lead_hours(lead_raw).ok_or_else(|| RecordError::BadLead(lead_raw.to_string()))?;

        let valid_raw = cols.text("FCST_VALID_BEG")?;
        let valid = parse_met_timestamp(valid_raw).ok_or_else(|| RecordError::BadTimestamp {
            column: "FCST_VALID_BEG",
            value: valid_raw.to_string(),
        })?;
        let init = valid
            .checked_sub_signed(Duration::hours(i64::from(lead_hours)))
            .ok_or_else(|| RecordError::BadLead(lead_raw.to_string()))?;

        let pnts_raw = cols.text("INTERP_PNTS")?;
        let interp_pnts = pnts_raw
            .parse::<f64>()
            .map(|p| p.round() as u32)
            .map_err(|_| RecordError::BadNumber {
                column: "INTERP_PNTS",
                value: pnts_raw.to_string(),
            })?;

        Ok(StatRecord {
            model: cols.text("MODEL")?.to_string(),
            desc: (get)("DESC").map(str::trim).unwrap_or("NA").to_string(),
            lead_hours,
            valid,
            init,
            fcst_var: cols.text("FCST_VAR")?.to_string(),
            fcst_units: (get)("FCST_UNITS").map(str::trim).unwrap_or("NA").to_string(),
            fcst_lev: cols.text("FCST_LEV")?.to_string(),
            obs_var: cols.text("OBS_VAR")?.to_string(),
            obs_lev: cols.text("OBS_LEV")?.to_string(),
            obtype: cols.text("OBTYPE")?.to_string(),
            vx_mask: cols.text("VX_MASK")?.to_string(),
            interp_mthd: cols.text("INTERP_MTHD")?.to_string(),
            interp_pnts,
            fcst_thresh: Threshold::parse_optional(cols.text("FCST_THRESH")?)?,
            obs_thresh: Threshold::parse_optional(cols.text("OBS_THRESH")?)?,
            stats: PartialSums::from_columns(line_type, &get)?,
        })
    }

    /// The timestamp on the requested axis.
    pub fn date(&self, date_type: DateType) -> NaiveDateTime {
        match date_type {
            DateType::Valid => self.valid,
            DateType::Init => self.init,
        }
    }

    /// Forecast threshold in symbol form, empty when the row has none.
    pub fn fcst_thresh_label(&self) -> String {
        self.fcst_thresh
            .as_ref()
            .map(|t| t.symbol_form())
            .unwrap_or_default()
    }
}
