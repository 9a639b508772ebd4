//! Forecast/observation thresholds in MET notation.
//!
//! MET writes thresholds in symbol form (`>=20`), configuration files
//! frequently use the letter form (`ge20`). Both forms parse to the same
//! [`Threshold`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Comparison operator of a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThresholdOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl ThresholdOp {
    /// Symbol form, longest symbols first so `<=` wins over `<`.
    const TABLE: [(ThresholdOp, &'static str, &'static str); 6] = [
        (ThresholdOp::Le, "<=", "le"),
        (ThresholdOp::Ge, ">=", "ge"),
        (ThresholdOp::Eq, "==", "eq"),
        (ThresholdOp::Ne, "!=", "ne"),
        (ThresholdOp::Lt, "<", "lt"),
        (ThresholdOp::Gt, ">", "gt"),
    ];

    pub fn symbol(&self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(op, _, _)| op == self)
            .map(|(_, sym, _)| *sym)
            .unwrap_or("")
    }

    pub fn letter(&self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(op, _, _)| op == self)
            .map(|(_, _, letter)| *letter)
            .unwrap_or("")
    }

    /// Split a threshold string into operator and remainder.
    fn split(s: &str) -> Option<(ThresholdOp, &str)> {
        let lower = s.to_ascii_lowercase();
        for (op, sym, letter) in Self::TABLE {
            if s.starts_with(sym) {
                return Some((op, &s[sym.len()..]));
            }
            if lower.starts_with(letter) {
                return Some((op, &s[letter.len()..]));
            }
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThresholdError {
    #[error("threshold '{0}' has no comparison operator")]
    MissingOperator(String),
    #[error("threshold '{0}' has a non-numeric value")]
    BadValue(String),
}

/// A single-sided threshold such as `>=20` or `lt0.254`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Threshold {
    pub op: ThresholdOp,
    pub value: f64,
    /// Value as written in the source, used for labels.
    pub value_text: String,
}

impl Threshold {
    /// Parse an optional threshold; `NA` and empty strings mean "no threshold".
    pub fn parse_optional(s: &str) -> Result<Option<Self>, ThresholdError> {
        let t = s.trim();
        if t.is_empty() || t.eq_ignore_ascii_case("NA") {
            return Ok(None);
        }
        t.parse().map(Some)
    }

    /// `>=20`
    pub fn symbol_form(&self) -> String {
        format!("{}{}", self.op.symbol(), self.value_text)
    }

    /// `ge20`
    pub fn letter_form(&self) -> String {
        format!("{}{}", self.op.letter(), self.value_text)
    }
}

impl PartialEq for Threshold {
    fn eq(&self, other: &Self) -> bool {
        self.op == other.op && self.value == other.value
    }
}

impl FromStr for Threshold {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        let (op, rest) =
            ThresholdOp::split(t).ok_or_else(|| ThresholdError::MissingOperator(s.to_string()))?;
        let rest = rest.trim();
        let value: f64 = rest
            .parse()
            .map_err(|_| ThresholdError::BadValue(s.to_string()))?;
        Ok(Threshold {
            op,
            value,
            value_text: rest.to_string(),
        })
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.symbol(), self.value_text)
    }
}

/// Return `(symbol form, letter form)` of a threshold string.
///
/// Strings that do not parse are returned unchanged in both positions, so
/// callers comparing against catalog entries simply find no match.
pub fn format_thresh(s: &str) -> (String, String) {
    match s.parse::<Threshold>() {
        Ok(t) => (t.symbol_form(), t.letter_form()),
        Err(_) => (s.to_string(), s.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_and_letter_forms_are_equal() {
        let a: Threshold = ">=20".parse().unwrap();
        let b: Threshold = "ge20".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.symbol_form(), ">=20");
        assert_eq!(b.letter_form(), "ge20");
    }

    #[test]
    fn two_char_operators_win() {
        let t: Threshold = "<=0.254".parse().unwrap();
        assert_eq!(t.op, ThresholdOp::Le);
        assert_eq!(t.value_text, "0.254");
        let t: Threshold = "<5".parse().unwrap();
        assert_eq!(t.op, ThresholdOp::Lt);
    }

    #[test]
    fn na_is_no_threshold() {
        assert_eq!(Threshold::parse_optional("NA").unwrap(), None);
        assert_eq!(Threshold::parse_optional("").unwrap(), None);
    }

    #[test]
    fn rejects_garbage() {
        assert!("20".parse::<Threshold>().is_err());
        assert!(">abc".parse::<Threshold>().is_err());
    }

    #[test]
    fn format_thresh_round_trips_both_forms() {
        assert_eq!(format_thresh("gt0.1"), (">0.1".into(), "gt0.1".into()));
        assert_eq!(format_thresh("==3"), ("==3".into(), "eq3".into()));
        assert_eq!(format_thresh("bogus"), ("bogus".into(), "bogus".into()));
    }
}
