//! Vertical level descriptions for titles and file names.

use serde::{Deserialize, Serialize};

/// Verification types whose bare numeric levels are pressure levels.
const PRESSURE_VERIF_TYPES: [&str; 3] = ["pres", "upper_air", "raob"];

/// Variables reduced to sea level; their `Z0` level is not "Surface".
const SEA_LEVEL_VARS: [&str; 4] = ["MSLP", "MSLET", "MSLMA", "PRMSL"];

/// Title fragment and file-name token for a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    /// Prefix for the second title line, including a trailing space when
    /// non-empty (`"500 hPa "`).
    pub display: String,
    /// Lower-case file-name token, empty when the level is implied.
    pub save: String,
}

impl LevelInfo {
    fn new(display: impl Into<String>, save: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            save: save.into(),
        }
    }
}

fn numeric_suffix(level: &str, prefix: char) -> Option<&str> {
    let rest = level.strip_prefix(prefix)?;
    if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        Some(rest)
    } else {
        None
    }
}

/// Describe `level` (MET `FCST_LEV`, e.g. `P500`, `Z2`, `L0`).
pub fn level_info(verif_type: &str, level: &str, var_name: &str) -> LevelInfo {
    let level = level.trim();
    let upper = level.to_ascii_uppercase();

    if let Some(p) = numeric_suffix(&upper, 'P') {
        return LevelInfo::new(format!("{p} hPa "), format!("{p}mb"));
    }
    if PRESSURE_VERIF_TYPES.contains(&verif_type.to_ascii_lowercase().as_str())
        && !upper.is_empty()
        && upper.bytes().all(|b| b.is_ascii_digit())
    {
        return LevelInfo::new(format!("{upper} hPa "), format!("{upper}mb"));
    }
    if upper == "Z0" {
        if SEA_LEVEL_VARS.contains(&var_name.to_ascii_uppercase().as_str()) {
            return LevelInfo::new("", "");
        }
        return LevelInfo::new("Surface ", "sfc");
    }
    if let Some(z) = numeric_suffix(&upper, 'Z') {
        return LevelInfo::new(format!("{z}-m "), format!("{z}m"));
    }
    if numeric_suffix(&upper, 'L').is_some() || numeric_suffix(&upper, 'A').is_some() {
        return LevelInfo::new("", "");
    }
    if level.is_empty() {
        return LevelInfo::new("", "");
    }
    LevelInfo::new(format!("{level} "), level.to_ascii_lowercase())
}
