//! MET line types and their column layouts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A MET statistics line type supported by the time-series plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineType {
    /// Scalar partial sums.
    Sl1l2,
    /// Scalar anomaly partial sums.
    Sal1l2,
    /// Vector partial sums.
    Vl1l2,
    /// Contingency table counts.
    Ctc,
    /// Neighborhood continuous statistics.
    Nbrcnt,
}

impl LineType {
    pub const ALL: [LineType; 5] = [
        LineType::Sl1l2,
        LineType::Sal1l2,
        LineType::Vl1l2,
        LineType::Ctc,
        LineType::Nbrcnt,
    ];

    /// Name as it appears in the `LINE_TYPE` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            LineType::Sl1l2 => "SL1L2",
            LineType::Sal1l2 => "SAL1L2",
            LineType::Vl1l2 => "VL1L2",
            LineType::Ctc => "CTC",
            LineType::Nbrcnt => "NBRCNT",
        }
    }

    /// Line-type specific columns, in file order after `LINE_TYPE`.
    ///
    /// Trailing columns added by newer MET versions are listed too; they are
    /// read when present and ignored otherwise.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            LineType::Sl1l2 => &["TOTAL", "FBAR", "OBAR", "FOBAR", "FFBAR", "OOBAR", "MAE"],
            LineType::Sal1l2 => &[
                "TOTAL", "FABAR", "OABAR", "FOABAR", "FFABAR", "OOABAR", "MAE",
            ],
            LineType::Vl1l2 => &[
                "TOTAL",
                "UFBAR",
                "VFBAR",
                "UOBAR",
                "VOBAR",
                "UVFOBAR",
                "UVFFBAR",
                "UVOOBAR",
                "F_SPEED_BAR",
                "O_SPEED_BAR",
            ],
            LineType::Ctc => &["TOTAL", "FY_OY", "FY_ON", "FN_OY", "FN_ON"],
            LineType::Nbrcnt => &[
                "TOTAL",
                "FBS",
                "FBS_BCL",
                "FBS_BCU",
                "FSS",
                "FSS_BCL",
                "FSS_BCU",
                "AFSS",
                "AFSS_BCL",
                "AFSS_BCU",
                "UFSS",
                "UFSS_BCL",
                "UFSS_BCU",
                "F_RATE",
                "F_RATE_BCL",
                "F_RATE_BCU",
                "O_RATE",
                "O_RATE_BCL",
                "O_RATE_BCU",
            ],
        }
    }
}

impl fmt::Display for LineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a line type name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported line type '{0}'")]
pub struct UnknownLineType(pub String);

impl FromStr for LineType {
    type Err = UnknownLineType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        LineType::ALL
            .iter()
            .copied()
            .find(|lt| lt.as_str() == upper)
            .ok_or(UnknownLineType(s.to_string()))
    }
}
