//! Batch driver: resolve a configuration into a run plan, then load and
//! plot every variable × level × domain combination.
//!
//! Problems that make the whole run meaningless (bad date type, no
//! metrics, unknown interpolation method, mismatched level lists) are
//! errors. Problems with single entries (unknown variable, level, domain,
//! threshold) are logged and the entry is skipped.

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use vxts_core::data::{load_stat_dir, DataError, DateWindow, StatQuery};
use vxts_core::domain::{format_thresh, DateType, LeadSelection, LineType, StatRecord};
use vxts_core::BootstrapSeeds;

use crate::config::{parse_day, ConfigError, PlotConfig, VariableSpec};
use crate::metrics::{Metric, UnknownMetric};
use crate::timeseries::{plot_time_series, PlotError, PlotRequest};

/// Interpolation methods MET writes to `INTERP_MTHD`.
pub const INTERP_METHODS: &[&str] = &[
    "NEAREST",
    "MIN",
    "MAX",
    "MEDIAN",
    "UW_MEAN",
    "DW_MEAN",
    "AW_MEAN",
    "LS_FIT",
    "BILIN",
    "NBRHD",
    "NBRHD_SQUARE",
    "NBRHD_CIRCLE",
    "GEOG_MATCH",
    "BUDGET",
    "FORCE",
    "UPPER_LEFT",
    "UPPER_RIGHT",
    "LOWER_RIGHT",
    "LOWER_LEFT",
    "HIRA",
    "MAXGAUSS",
];

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Metric(#[from] UnknownMetric),
    #[error("unknown interpolation method: {0}")]
    UnknownInterp(String),
    #[error("forecast and observation level lists differ in length ({fcst} vs {obs})")]
    LevelMismatch { fcst: usize, obs: usize },
    #[error("forecast and observation threshold lists differ in length ({fcst} vs {obs})")]
    ThreshMismatch { fcst: usize, obs: usize },
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Plot(#[from] PlotError),
}

// ─── Run plan ────────────────────────────────────────────────────────

/// A forecast/observation level pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelPair {
    pub fcst: String,
    pub obs: String,
}

/// One variable that passed validation, with its usable thresholds and levels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedVariable {
    pub spec: VariableSpec,
    pub fcst_thresh: Vec<String>,
    pub obs_thresh: Vec<String>,
    pub levels: Vec<LevelPair>,
}

/// Everything a run will do, resolved from the configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunPlan {
    pub line_type: LineType,
    pub date_type: DateType,
    pub eval_period: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub date_hours: Vec<u32>,
    pub leads: LeadSelection,
    pub interp: String,
    pub metric1: Metric,
    pub metric2: Option<Metric>,
    pub models: Vec<String>,
    pub domains: Vec<String>,
    pub variables: Vec<PlannedVariable>,
}

impl RunPlan {
    /// Resolve a validated configuration into a plan.
    pub fn resolve(config: &PlotConfig) -> Result<Self, DriverError> {
        config.validate()?;
        let run = &config.run;
        let line_type = run.line_type()?;
        let date_type = run.date_type()?;
        let (start, end) = period_bounds(config, date_type)?;

        let (metric1, metric2) = resolve_metrics(&run.metrics)?;
        for metric in std::iter::once(metric1).chain(metric2) {
            if metric.line_type() != line_type {
                warn!(
                    "The requested metric is not valid for line_type {line_type}: {metric}; continuing"
                );
            }
        }

        let interp = run.interp.trim().to_uppercase();
        if !INTERP_METHODS.contains(&interp.as_str()) {
            return Err(DriverError::UnknownInterp(run.interp.clone()));
        }

        let fcst_levels = config.levels(&run.fcst_level);
        let obs_levels = config.levels(&run.obs_level);
        if fcst_levels.len() != obs_levels.len() {
            return Err(DriverError::LevelMismatch {
                fcst: fcst_levels.len(),
                obs: obs_levels.len(),
            });
        }

        if !run.obs_thresh.is_empty() && run.obs_thresh.len() != run.fcst_thresh.len() {
            return Err(DriverError::ThreshMismatch {
                fcst: run.fcst_thresh.len(),
                obs: run.obs_thresh.len(),
            });
        }

        let mut variables = Vec::new();
        for name in &run.variables {
            let Some(spec) = config.variable(name) else {
                warn!("The requested variable is not in the catalog: {name}; continuing");
                continue;
            };
            let (fcst_thresh, obs_thresh) =
                valid_thresholds(spec, &run.fcst_thresh, &run.obs_thresh);
            let levels = valid_levels(spec, &fcst_levels, &obs_levels);
            if levels.is_empty() {
                warn!("No valid levels for variable {name}; continuing");
                continue;
            }
            variables.push(PlannedVariable {
                spec: spec.clone(),
                fcst_thresh,
                obs_thresh,
                levels,
            });
        }

        let domains = run
            .domains
            .iter()
            .filter(|d| {
                let known = config.domains.is_empty() || config.domains.contains_key(d.as_str());
                if !known {
                    warn!("The requested domain is not in the domain table: {d}; continuing");
                }
                known
            })
            .cloned()
            .collect();

        Ok(Self {
            line_type,
            date_type,
            eval_period: run.eval_period.clone(),
            start,
            end,
            date_hours: run.date_hours(date_type).to_vec(),
            leads: LeadSelection::from_hours(&run.fcst_leads),
            interp,
            metric1,
            metric2,
            models: run.models.clone(),
            domains,
            variables,
        })
    }

    /// Inclusive window from the first day's midnight to the last moment of
    /// the last day.
    pub fn window(&self) -> DateWindow {
        let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        DateWindow {
            start: self.start.and_time(NaiveTime::MIN),
            end: NaiveDateTime::new(self.end, last),
        }
    }

    /// Number of plots the plan will attempt.
    pub fn plot_count(&self) -> usize {
        self.variables
            .iter()
            .map(|v| v.levels.len() * self.domains.len())
            .sum()
    }
}

/// `(begin, end)` days of the evaluation period on `date_type`.
fn period_bounds(config: &PlotConfig, date_type: DateType) -> Result<(NaiveDate, NaiveDate), ConfigError> {
    let run = &config.run;
    if run.eval_period.eq_ignore_ascii_case("TEST") {
        return run.date_bounds(date_type);
    }
    let preset = config
        .presets
        .dates
        .get(&run.eval_period)
        .ok_or_else(|| ConfigError::Invalid {
            field: "run.eval_period",
            reason: format!("no date preset named '{}'", run.eval_period),
        })?;
    let (beg, end) = match date_type {
        DateType::Valid => (&preset.valid_beg, &preset.valid_end),
        DateType::Init => (&preset.init_beg, &preset.init_end),
    };
    Ok((parse_day("presets.dates.*_beg", beg)?, parse_day("presets.dates.*_end", end)?))
}

/// First one or two non-empty metric names.
fn resolve_metrics(names: &[String]) -> Result<(Metric, Option<Metric>), DriverError> {
    let names: Vec<&str> = names
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if names.len() > 2 {
        warn!(
            "Only two metrics can be plotted together; ignoring {}",
            names[2..].join(", ")
        );
    }
    match names.as_slice() {
        [] => Err(ConfigError::Invalid {
            field: "run.metrics",
            reason: "at least one metric is required".to_string(),
        }
        .into()),
        [one] => Ok((one.parse()?, None)),
        [one, two, ..] => Ok((one.parse()?, Some(two.parse()?))),
    }
}

/// Keep threshold pairs that the variable catalog lists, in either form.
///
/// Observation thresholds default to the forecast thresholds.
fn valid_thresholds(spec: &VariableSpec, fcst: &[String], obs: &[String]) -> (Vec<String>, Vec<String>) {
    let obs: Vec<String> = if obs.is_empty() { fcst.to_vec() } else { obs.to_vec() };
    let listed = |t: &str, catalog: &[String]| {
        if catalog.is_empty() {
            return true;
        }
        let (symbol, letter) = format_thresh(t);
        catalog.iter().any(|c| *c == symbol || *c == letter)
    };

    let mut keep_f = Vec::new();
    let mut keep_o = Vec::new();
    let mut dropped = Vec::new();
    for (f, o) in fcst.iter().zip(&obs) {
        if listed(f, &spec.fcst_thresholds) && listed(o, &spec.obs_thresholds) {
            keep_f.push(f.clone());
            keep_o.push(o.clone());
        } else {
            dropped.push(f.as_str());
        }
    }
    if !dropped.is_empty() {
        warn!(
            "The requested thresholds are not valid for {}: {}; continuing",
            spec.name,
            dropped.join(", ")
        );
    }
    (keep_f, keep_o)
}

/// Level pairs the variable catalog accepts.
fn valid_levels(spec: &VariableSpec, fcst: &[String], obs: &[String]) -> Vec<LevelPair> {
    fcst.iter()
        .zip(obs)
        .filter(|(f, o)| {
            let ok = (spec.fcst_levels.is_empty() || spec.fcst_levels.contains(f))
                && (spec.obs_levels.is_empty() || spec.obs_levels.contains(o));
            if !ok {
                warn!(
                    "The requested variable/level combination is not valid: {}/{f}",
                    spec.name
                );
            }
            ok
        })
        .map(|(f, o)| LevelPair {
            fcst: f.clone(),
            obs: o.clone(),
        })
        .collect()
}

// ─── Execution ───────────────────────────────────────────────────────

/// Outcome counts for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub plots_attempted: usize,
    pub plots_saved: usize,
    pub plots_skipped: usize,
    pub saved: Vec<PathBuf>,
}

fn log_settings(config: &PlotConfig, plan: &RunPlan) {
    let run = &config.run;
    let s = &config.settings;
    debug!("========================================");
    debug!("Config file settings");
    debug!("LOG_LEVEL: {}", run.log_level);
    debug!("IMG_HEADER: {}", if run.img_header.is_empty() { "No header" } else { &run.img_header });
    debug!("STAT_DIR: {}", run.stat_dir.display());
    debug!("SAVE_DIR: {}", run.save_dir.display());
    debug!("RESTART_DIR: {:?}", run.restart_dir);
    debug!("MODELS: {:?}", plan.models);
    debug!("VARIABLES: {:?}", run.variables);
    debug!("DOMAINS: {:?}", plan.domains);
    debug!("INTERP: {}", plan.interp);
    debug!("DATE_TYPE: {}", plan.date_type.as_str());
    debug!("EVAL_PERIOD: {} ({} to {})", plan.eval_period, plan.start, plan.end);
    debug!("DATE_HOURS: {:?}", plan.date_hours);
    debug!("FCST_LEADS: {}", plan.leads.display_string());
    debug!("FCST_LEVEL: {} / OBS_LEVEL: {}", run.fcst_level, run.obs_level);
    debug!("LINE_TYPE: {}", plan.line_type);
    debug!("METRICS: {} {:?}", plan.metric1, plan.metric2.map(|m| m.name()));
    debug!("CONFIDENCE_INTERVALS: {}", run.confidence_intervals);
    debug!("----------------------------------------");
    debug!("Y limits: [{}, {}], locked: {}", s.y_min_limit, s.y_max_limit, s.y_lim_lock);
    debug!("Display averages? {}", if s.display_averages { "yes" } else { "no" });
    if run.confidence_intervals {
        debug!("Confidence Level: {}%", (s.ci_lev * 100.0).round());
        debug!("Bootstrap method: {:?}", s.bs_method);
        debug!("Bootstrap repetitions: {}", s.bs_nrep);
        debug!("Minimum sample size for confidence intervals: {}", s.bs_min_samp);
    }
    debug!("========================================");
}

/// Rows of one verification mask and forecast level.
fn select_records(records: &[StatRecord], domain: &str, fcst_level: &str) -> Vec<StatRecord> {
    records
        .iter()
        .filter(|r| r.vx_mask.eq_ignore_ascii_case(domain) && r.fcst_lev == fcst_level)
        .cloned()
        .collect()
}

/// Load and plot everything in `plan`.
///
/// The stat directory is read once per variable; plots then draw their
/// rows from that load by mask and level.
pub fn run_plan(plan: &RunPlan, config: &PlotConfig) -> Result<RunSummary, DriverError> {
    log_settings(config, plan);
    let seeds = BootstrapSeeds::new(config.settings.bs_seed);
    let run = &config.run;
    let mut summary = RunSummary::default();

    for var in &plan.variables {
        let query = StatQuery {
            line_type: plan.line_type,
            models: plan.models.clone(),
            fcst_var_names: var.spec.fcst_var_names.clone(),
            vx_mask: None,
            interp_mthd: Some(plan.interp.clone()),
            date_type: plan.date_type,
            window: Some(plan.window()),
            date_hours: plan.date_hours.clone(),
            leads: plan.leads.clone(),
        };
        let loaded = load_stat_dir(&run.stat_dir, &query)?;
        debug!(
            "Loaded {} rows for {} from {} files",
            loaded.records.len(),
            var.spec.name,
            loaded.files_read
        );

        for level in &var.levels {
            for domain in &plan.domains {
                summary.plots_attempted += 1;
                let records = select_records(&loaded.records, domain, &level.fcst);
                if records.is_empty() {
                    warn!(
                        "No data for {} {} over {}; continuing",
                        var.spec.name, level.fcst, domain
                    );
                    summary.plots_skipped += 1;
                    continue;
                }

                let request = PlotRequest {
                    variable: var.spec.clone(),
                    fcst_level: level.fcst.clone(),
                    vx_mask: domain.clone(),
                    models: plan.models.clone(),
                    metric1: plan.metric1,
                    metric2: plan.metric2,
                    date_type: plan.date_type,
                    date_hours: plan.date_hours.clone(),
                    start: plan.start,
                    end: plan.end,
                    eval_period: plan.eval_period.clone(),
                    leads: plan.leads.clone(),
                    fcst_thresh: var.fcst_thresh.clone(),
                    interp_pnts: run.interp_pnts.clone(),
                    confidence_intervals: run.confidence_intervals,
                };
                match plot_time_series(records, &request, config, &seeds)? {
                    Some(path) => {
                        summary.plots_saved += 1;
                        summary.saved.push(path);
                    }
                    None => summary.plots_skipped += 1,
                }
            }
        }
    }

    info!(
        "Run finished: {} saved, {} skipped of {} plots",
        summary.plots_saved, summary.plots_skipped, summary.plots_attempted
    );
    Ok(summary)
}

/// Resolve and execute a configuration.
pub fn run(config: &PlotConfig) -> Result<RunSummary, DriverError> {
    let plan = RunPlan::resolve(config)?;
    info!(
        "Planned {} plots from {} to {}",
        plan.plot_count(),
        plan.start,
        plan.end
    );
    run_plan(&plan, config)
}
