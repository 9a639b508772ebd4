//! TOML plot configuration.
//!
//! One file describes a whole batch: where the statistics live, which
//! models/variables/levels/domains to plot, the plotting toggles, and the
//! variable catalog used to validate requests and label figures.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use vxts_core::domain::{DateType, LineType};

use crate::aggregate::DateBin;
use crate::bootstrap::BootstrapMethod;
use crate::filters::InterpShape;

/// Errors from loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

// ─── Top level ───────────────────────────────────────────────────────

/// Complete configuration for one batch of time-series plots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlotConfig {
    pub run: RunSection,
    #[serde(default)]
    pub settings: PlotSettings,
    #[serde(default)]
    pub logos: LogoSettings,
    #[serde(default)]
    pub presets: Presets,
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
    /// Verification masks and their display names.
    #[serde(default)]
    pub domains: BTreeMap<String, DomainSpec>,
    #[serde(default)]
    pub models: Vec<ModelStyle>,
    #[serde(default)]
    pub obs_style: LineStyle,
}

impl PlotConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Check the settings that make a whole run impossible.
    ///
    /// Entries that only affect single plots (unknown variables, levels,
    /// domains, thresholds) are reported later as warnings and skipped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let run = &self.run;
        run.line_type()?;
        run.date_type()?;
        if run.metrics.iter().all(|m| m.trim().is_empty()) {
            return Err(invalid(
                "run.metrics",
                "at least one metric is required",
            ));
        }
        if run.models.is_empty() {
            return Err(invalid("run.models", "at least one model is required"));
        }
        if run.eval_period.eq_ignore_ascii_case("TEST") {
            let (beg, end) = run.date_bounds(run.date_type()?)?;
            if end < beg {
                return Err(invalid("run", format!("date range ends before it begins ({beg} > {end})")));
            }
        } else if !self.presets.dates.contains_key(&run.eval_period) {
            return Err(invalid(
                "run.eval_period",
                format!("no date preset named '{}'", run.eval_period),
            ));
        }

        let s = &self.settings;
        if !(s.ci_lev > 0.0 && s.ci_lev < 1.0) {
            return Err(invalid("settings.ci_lev", format!("{} is not in (0, 1)", s.ci_lev)));
        }
        if s.bs_nrep == 0 {
            return Err(invalid("settings.bs_nrep", "must be positive"));
        }
        if s.dpi == 0 {
            return Err(invalid("settings.dpi", "must be positive"));
        }

        for style in &self.models {
            parse_hex_color(&style.style.color).ok_or_else(|| {
                invalid("models.color", format!("'{}' is not #rrggbb", style.style.color))
            })?;
        }
        parse_hex_color(&self.obs_style.color).ok_or_else(|| {
            invalid("obs_style.color", format!("'{}' is not #rrggbb", self.obs_style.color))
        })?;
        Ok(())
    }

    /// Catalog entry for a requested variable name.
    pub fn variable(&self, name: &str) -> Option<&VariableSpec> {
        self.variables
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
    }

    /// Style for a model, falling back to the built-in palette by position.
    pub fn model_style(&self, model: &str, index: usize) -> ModelStyle {
        self.models
            .iter()
            .find(|m| m.name == model)
            .cloned()
            .unwrap_or_else(|| ModelStyle {
                name: model.to_string(),
                plot_name: None,
                style: LineStyle {
                    color: PALETTE[index % PALETTE.len()].to_string(),
                    ..LineStyle::default()
                },
            })
    }

    /// Split a level request, expanding a preset name.
    pub fn levels(&self, request: &str) -> Vec<String> {
        let raw = self
            .presets
            .levels
            .get(request)
            .map(String::as_str)
            .unwrap_or(request);
        split_levels(raw)
    }
}

// ─── Run section ─────────────────────────────────────────────────────

/// What to plot: inputs, selections and output locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSection {
    pub stat_dir: PathBuf,
    pub save_dir: PathBuf,
    /// Mirror directory receiving a copy of every saved image.
    #[serde(default)]
    pub restart_dir: Option<PathBuf>,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Prefix prepended to every image name.
    #[serde(default)]
    pub img_header: String,
    /// Verification type (`pres`, `upper_air`, `sfc`, ...), used for level text.
    #[serde(default = "default_verif_type")]
    pub verif_type: String,
    pub line_type: String,
    pub interp: String,
    #[serde(default)]
    pub interp_pnts: Vec<u32>,
    pub models: Vec<String>,
    pub domains: Vec<String>,
    pub variables: Vec<String>,
    #[serde(default = "default_date_type")]
    pub date_type: String,
    #[serde(default = "default_eval_period")]
    pub eval_period: String,
    #[serde(default)]
    pub valid_beg: String,
    #[serde(default)]
    pub valid_end: String,
    #[serde(default)]
    pub init_beg: String,
    #[serde(default)]
    pub init_end: String,
    #[serde(default)]
    pub valid_hours: Vec<u32>,
    #[serde(default)]
    pub init_hours: Vec<u32>,
    /// Empty for all leads.
    #[serde(default)]
    pub fcst_leads: Vec<u32>,
    /// Comma-separated levels or a level preset name.
    pub fcst_level: String,
    pub obs_level: String,
    #[serde(default)]
    pub fcst_thresh: Vec<String>,
    #[serde(default)]
    pub obs_thresh: Vec<String>,
    pub metrics: Vec<String>,
    #[serde(default)]
    pub confidence_intervals: bool,
}

fn default_log_file() -> PathBuf {
    PathBuf::from("vxts.log")
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_verif_type() -> String {
    "pres".to_string()
}

fn default_date_type() -> String {
    "VALID".to_string()
}

fn default_eval_period() -> String {
    "TEST".to_string()
}

impl RunSection {
    pub fn line_type(&self) -> Result<LineType, ConfigError> {
        self.line_type
            .parse()
            .map_err(|e| invalid("run.line_type", format!("{e}")))
    }

    pub fn date_type(&self) -> Result<DateType, ConfigError> {
        self.date_type
            .parse()
            .map_err(|e| invalid("run.date_type", format!("{e}")))
    }

    /// Hours of day requested on the configured date type.
    pub fn date_hours(&self, date_type: DateType) -> &[u32] {
        match date_type {
            DateType::Valid => &self.valid_hours,
            DateType::Init => &self.init_hours,
        }
    }

    /// Explicit `(begin, end)` days for the `TEST` period.
    pub fn date_bounds(&self, date_type: DateType) -> Result<(NaiveDate, NaiveDate), ConfigError> {
        let (beg, end) = match date_type {
            DateType::Valid => (&self.valid_beg, &self.valid_end),
            DateType::Init => (&self.init_beg, &self.init_end),
        };
        Ok((parse_day("run.*_beg", beg)?, parse_day("run.*_end", end)?))
    }
}

/// Parse a `YYYYMMDD` day.
pub fn parse_day(field: &'static str, s: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(s.trim(), "%Y%m%d")
        .map_err(|_| invalid(field, format!("'{s}' is not a YYYYMMDD date")))
}

// ─── Settings ────────────────────────────────────────────────────────

/// Plotting toggles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlotSettings {
    /// Lowest allowed lower y limit.
    pub y_min_limit: f64,
    /// Highest allowed upper y limit.
    pub y_max_limit: f64,
    /// Use the limits as-is instead of shrinking toward the data.
    pub y_lim_lock: bool,
    pub bs_nrep: usize,
    pub bs_method: BootstrapMethod,
    pub ci_lev: f64,
    pub bs_min_samp: usize,
    pub bs_seed: u64,
    pub sample_equalization: bool,
    pub display_averages: bool,
    pub keep_shared_events_only: bool,
    pub aggregate_dates_by: DateBin,
    /// Trailing running-mean window in points; 0 disables it.
    pub running_mean: usize,
    pub dpi: u32,
    pub interp_shape: InterpShape,
    /// Write pivot tables and a manifest next to each image.
    pub export_tables: bool,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            y_min_limit: -10.0,
            y_max_limit: 10.0,
            y_lim_lock: false,
            bs_nrep: 5000,
            bs_method: BootstrapMethod::MatchedPairs,
            ci_lev: 0.95,
            bs_min_samp: 30,
            bs_seed: 42,
            sample_equalization: true,
            display_averages: true,
            keep_shared_events_only: false,
            aggregate_dates_by: DateBin::None,
            running_mean: 0,
            dpi: 100,
            interp_shape: InterpShape::Square,
            export_tables: false,
        }
    }
}

// ─── Logos ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogoSettings {
    pub left: LogoSpec,
    pub right: LogoSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogoSpec {
    pub enabled: bool,
    pub path: PathBuf,
    /// Fraction of the image's original size.
    pub zoom: f64,
}

impl Default for LogoSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::new(),
            zoom: 1.0,
        }
    }
}

// ─── Presets ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Presets {
    /// Named evaluation periods.
    pub dates: BTreeMap<String, DatePreset>,
    /// Named comma-separated level lists.
    pub levels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatePreset {
    pub valid_beg: String,
    pub valid_end: String,
    pub init_beg: String,
    pub init_end: String,
}

// ─── Variable catalog ────────────────────────────────────────────────

/// A plottable variable and the requests it accepts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableSpec {
    pub name: String,
    pub fcst_var_names: Vec<String>,
    pub obs_var_names: Vec<String>,
    #[serde(default)]
    pub fcst_levels: Vec<String>,
    #[serde(default)]
    pub obs_levels: Vec<String>,
    #[serde(default)]
    pub fcst_thresholds: Vec<String>,
    #[serde(default)]
    pub obs_thresholds: Vec<String>,
    #[serde(default = "default_plot_group")]
    pub plot_group: String,
    pub long_name: String,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub conversion: Option<UnitConversion>,
}

fn default_plot_group() -> String {
    "sfc_upper".to_string()
}

/// Affine unit conversion applied to plotted values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitConversion {
    pub to_units: String,
    #[serde(default = "one")]
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
}

fn one() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainSpec {
    pub long_name: String,
}

// ─── Styles ──────────────────────────────────────────────────────────

/// Marker drawn at each plotted point.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    #[default]
    Circle,
    Square,
    Triangle,
    Cross,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LineStyle {
    /// `#rrggbb`
    pub color: String,
    pub marker: Marker,
    pub linewidth: u32,
    pub markersize: u32,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            color: "#7a7a7a".to_string(),
            marker: Marker::Circle,
            linewidth: 2,
            markersize: 6,
        }
    }
}

impl LineStyle {
    pub fn rgb(&self) -> (u8, u8, u8) {
        parse_hex_color(&self.color).unwrap_or((0, 0, 0))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelStyle {
    pub name: String,
    /// Legend name; defaults to the model name.
    #[serde(default)]
    pub plot_name: Option<String>,
    #[serde(flatten)]
    pub style: LineStyle,
}

impl ModelStyle {
    pub fn display_name(&self) -> &str {
        self.plot_name.as_deref().unwrap_or(&self.name)
    }
}

/// Colors used for models without a configured style.
pub const PALETTE: [&str; 10] = [
    "#1f77b4", "#d62728", "#2ca02c", "#ff7f0e", "#9467bd", "#8c564b", "#e377c2", "#17becf",
    "#bcbd22", "#000000",
];

/// Parse `#rrggbb`.
pub fn parse_hex_color(s: &str) -> Option<(u8, u8, u8)> {
    let hex = s.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Split a comma-separated level list.
///
/// A comma directly followed by `0` or `*` is part of a level name (layer
/// levels such as `P850-0,0` keep their inner comma), so it does not split.
pub fn split_levels(raw: &str) -> Vec<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let chars: Vec<char> = compact.chars().collect();
    let mut out = Vec::new();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        let splits = c == ','
            && !matches!(chars.get(i + 1), Some('0') | Some('*'));
        if splits {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}
