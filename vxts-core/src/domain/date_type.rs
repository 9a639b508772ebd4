//! Which timestamp (valid or initialization) forms the x-axis.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DateType {
    Valid,
    Init,
}

impl DateType {
    /// Upper-case column label, `VALID` or `INIT`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DateType::Valid => "VALID",
            DateType::Init => "INIT",
        }
    }

    /// Capitalized word used in the third title line.
    pub fn title_word(&self) -> &'static str {
        match self {
            DateType::Valid => "Valid",
            DateType::Init => "Init",
        }
    }

    /// Default x-axis label.
    pub fn axis_label(&self) -> &'static str {
        match self {
            DateType::Valid => "Valid Date",
            DateType::Init => "Initialization Date",
        }
    }
}

impl fmt::Display for DateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid date type '{0}'; valid values are VALID or INIT")]
pub struct InvalidDateType(pub String);

impl FromStr for DateType {
    type Err = InvalidDateType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VALID" => Ok(DateType::Valid),
            "INIT" => Ok(DateType::Init),
            _ => Err(InvalidDateType(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_type() {
        assert_eq!("valid".parse::<DateType>().unwrap(), DateType::Valid);
        assert_eq!("INIT".parse::<DateType>().unwrap(), DateType::Init);
        assert!("LEAD".parse::<DateType>().is_err());
    }
}
