//! One time-series plot: filter, equalize, aggregate, pivot, render, save.
//!
//! [`prepare_time_series`] is pure and produces the tables behind a plot;
//! [`render_time_series`] turns them into a PNG on disk. A plot that runs
//! out of data at any step is skipped with a warning and `Ok(None)`.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use thiserror::Error;
use tracing::{info, warn};

use vxts_core::domain::{DateType, LeadSelection, StatRecord};
use vxts_core::BootstrapSeeds;

use crate::aggregate::{aggregate, keep_shared_dates, AggregateError, AggregateRequest, AggregatedRow};
use crate::bootstrap::BootstrapConfig;
use crate::config::{PlotConfig, UnitConversion, VariableSpec};
use crate::equalize::equalize_samples;
use crate::export::export_tables;
use crate::figure::build_figure;
use crate::filters::{
    filter_by_lead, filter_by_level, filter_by_thresh, filter_by_width, filter_models,
    present_date_hours, FilterError, SelectionLabel, ThreshSelection,
};
use crate::metrics::Metric;
use crate::naming::{NamingError, SaveNameParts, SaveTarget};
use crate::pivot::{full_date_axis, intersect_dates, PivotTable};
use crate::reference::{detect_reference, ReferenceLine};
use crate::render::{render_png, RenderError};

#[derive(Debug, Error)]
pub enum PlotError {
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Naming(#[from] NamingError),
    #[error(transparent)]
    Export(#[from] anyhow::Error),
}

// ─── Request ─────────────────────────────────────────────────────────

/// Everything that identifies one plot.
#[derive(Debug, Clone)]
pub struct PlotRequest {
    pub variable: VariableSpec,
    pub fcst_level: String,
    pub vx_mask: String,
    pub models: Vec<String>,
    pub metric1: Metric,
    pub metric2: Option<Metric>,
    pub date_type: DateType,
    /// Requested hours of day; empty means every hour in the data.
    pub date_hours: Vec<u32>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub eval_period: String,
    pub leads: LeadSelection,
    pub fcst_thresh: Vec<String>,
    pub interp_pnts: Vec<u32>,
    pub confidence_intervals: bool,
}

// ─── Prepared data ───────────────────────────────────────────────────

/// Lower and upper CI offset tables.
pub type CiTables = (PivotTable, PivotTable);

/// The tables behind one plot, on a shared date axis.
#[derive(Debug, Clone)]
pub struct PlotTables {
    pub metric1: PivotTable,
    pub metric2: Option<PivotTable>,
    pub counts: PivotTable,
    pub ci1: Option<CiTables>,
    pub ci2: Option<CiTables>,
}

/// Result of [`prepare_time_series`].
#[derive(Debug, Clone)]
pub struct PreparedPlot {
    pub metric1: Metric,
    pub metric2: Option<Metric>,
    /// Models that survived filtering, in request order.
    pub models: Vec<String>,
    pub tables: PlotTables,
    pub reference1: Option<ReferenceLine>,
    pub reference2: Option<ReferenceLine>,
    /// Whether sample equalization succeeded; sample counts are only shown
    /// for equalized plots.
    pub equalized: bool,
    /// Requested hours that occur in the data.
    pub date_hours: Vec<u32>,
    pub lead: SelectionLabel,
    pub width: SelectionLabel,
    pub thresh: Option<ThreshSelection>,
    /// Display units after conversion.
    pub units: String,
    /// `FCST_VAR` of the plotted rows, used in the file name.
    pub fcst_var: String,
}

impl PreparedPlot {
    pub fn dates(&self) -> &[NaiveDateTime] {
        self.tables.metric1.dates()
    }
}

macro_rules! skip_if_empty {
    ($records:expr, $why:expr) => {
        if $records.is_empty() {
            warn!("Continuing due to missing data: {}", $why);
            return Ok(None);
        }
    };
}

/// Run the filter chain, equalization, aggregation, and pivoting.
pub fn prepare_time_series(
    records: Vec<StatRecord>,
    request: &PlotRequest,
    config: &PlotConfig,
    seeds: &BootstrapSeeds,
) -> Result<Option<PreparedPlot>, PlotError> {
    let settings = &config.settings;
    let units = display_units(&request.variable, &records);

    let records = filter_by_level(records, &request.fcst_level);
    skip_if_empty!(records, format!("no rows at level {}", request.fcst_level));

    let (records, lead) = filter_by_lead(records, &request.leads);
    skip_if_empty!(records, format!("no rows for {}", lead.display));

    let date_hours = present_date_hours(&records, request.date_type, &request.date_hours);
    let records: Vec<StatRecord> = records
        .into_iter()
        .filter(|r| date_hours.contains(&r.date(request.date_type).hour()))
        .collect();
    skip_if_empty!(records, "none of the requested hours occur in the data");

    let (records, width) = filter_by_width(records, &request.interp_pnts, settings.interp_shape);
    skip_if_empty!(records, "no rows at the requested interpolation widths");

    let (records, thresh) = filter_by_thresh(records, &request.fcst_thresh)?;
    skip_if_empty!(records, "no rows at the requested thresholds");

    let (records, models) = filter_models(records, &request.models);
    skip_if_empty!(records, "none of the requested models are in the data");
    let fcst_var = records
        .first()
        .map(|r| r.fcst_var.clone())
        .unwrap_or_else(|| request.variable.name.clone());

    let (records, equalized) = if settings.sample_equalization {
        let eq = equalize_samples(records, &models);
        (eq.records, eq.equalized)
    } else {
        (records, false)
    };

    let agg_request = AggregateRequest {
        models: models.clone(),
        date_type: request.date_type,
        date_bin: settings.aggregate_dates_by,
        metric1: request.metric1,
        metric2: request.metric2,
        bootstrap: request
            .confidence_intervals
            .then(|| BootstrapConfig::from_settings(settings)),
    };
    let mut rows = aggregate(&records, &agg_request, seeds)?;
    if settings.keep_shared_events_only && equalized {
        rows = keep_shared_dates(rows, &models);
    }
    skip_if_empty!(rows, "no group produced a finite metric");

    let conversion = request.variable.conversion.as_ref();
    let axis = full_date_axis(
        request.start,
        request.end,
        &date_hours,
        settings.aggregate_dates_by,
    );
    let Some(tables) = build_tables(&rows, &models, request, conversion, &axis, settings.running_mean)
    else {
        warn!("Continuing due to missing data: every plotted value is missing");
        return Ok(None);
    };

    let reference1 = detect_reference(
        request.metric1,
        &tables.metric1,
        tables.ci1.as_ref().map(|(lo, hi)| (lo, hi)),
    );
    let reference2 = match (request.metric2, &tables.metric2) {
        (Some(m), Some(t)) => detect_reference(m, t, tables.ci2.as_ref().map(|(lo, hi)| (lo, hi))),
        _ => None,
    };

    Ok(Some(PreparedPlot {
        metric1: request.metric1,
        metric2: request.metric2,
        models,
        tables,
        reference1,
        reference2,
        equalized,
        date_hours,
        lead,
        width,
        thresh,
        units,
        fcst_var,
    }))
}

fn display_units(variable: &VariableSpec, records: &[StatRecord]) -> String {
    if let Some(conv) = &variable.conversion {
        return conv.to_units.clone();
    }
    if !variable.units.is_empty() {
        return variable.units.clone();
    }
    records
        .iter()
        .map(|r| r.fcst_units.as_str())
        .find(|u| !u.is_empty() && *u != "NA")
        .unwrap_or("")
        .to_string()
}

fn pivot_of<F>(rows: &[AggregatedRow], models: &[String], axis: &[NaiveDateTime], value: F) -> PivotTable
where
    F: Fn(&AggregatedRow) -> Option<f64>,
{
    PivotTable::from_triples(
        models,
        rows.iter()
            .filter_map(|r| value(r).map(|v| (r.date, r.model.as_str(), v))),
    )
    .reindex(axis)
}

fn ci_pivots<F>(
    rows: &[AggregatedRow],
    models: &[String],
    axis: &[NaiveDateTime],
    metric: Metric,
    conversion: Option<&UnitConversion>,
    pick: F,
) -> CiTables
where
    F: Fn(&AggregatedRow) -> Option<(f64, f64)>,
{
    let lo = pivot_of(rows, models, axis, |r| {
        pick(r).map(|(lo, _)| metric.convert_delta(lo, conversion))
    });
    let hi = pivot_of(rows, models, axis, |r| {
        pick(r).map(|(_, hi)| metric.convert_delta(hi, conversion))
    });
    (lo, hi)
}

fn build_tables(
    rows: &[AggregatedRow],
    models: &[String],
    request: &PlotRequest,
    conversion: Option<&UnitConversion>,
    axis: &[NaiveDateTime],
    running_mean: usize,
) -> Option<PlotTables> {
    let m1 = request.metric1;
    let mut metric1 = pivot_of(rows, models, axis, |r| Some(m1.convert(r.metric1, conversion)));
    let mut metric2 = request.metric2.map(|m2| {
        pivot_of(rows, models, axis, |r| r.metric2.map(|v| m2.convert(v, conversion)))
    });
    let mut counts = pivot_of(rows, models, axis, |r| Some(r.count as f64));

    let mut ci1 = request
        .confidence_intervals
        .then(|| ci_pivots(rows, models, axis, m1, conversion, |r| r.ci1));
    let mut ci2 = match (request.confidence_intervals, request.metric2) {
        (true, Some(m2)) => Some(ci_pivots(rows, models, axis, m2, conversion, |r| r.ci2)),
        _ => None,
    };

    if running_mean > 1 {
        metric1 = metric1.running_mean(running_mean);
        metric2 = metric2.map(|t| t.running_mean(running_mean));
    }

    if let Some((lo1, hi1)) = ci1.as_ref().filter(|(lo, hi)| !(lo.is_all_nan() && hi.is_all_nan())) {
        let mut sets = vec![
            metric1.populated_dates(),
            lo1.populated_dates(),
            hi1.populated_dates(),
        ];
        if let (Some(t2), Some((lo2, hi2))) = (&metric2, &ci2) {
            if !(lo2.is_all_nan() && hi2.is_all_nan()) {
                sets.extend([t2.populated_dates(), lo2.populated_dates(), hi2.populated_dates()]);
            }
        }
        let common: BTreeSet<NaiveDateTime> = intersect_dates(&sets);
        metric1.retain_dates(&common);
        counts.retain_dates(&common);
        if let Some(t) = metric2.as_mut() {
            t.retain_dates(&common);
        }
        for (lo, hi) in ci1.iter_mut().chain(ci2.iter_mut()) {
            lo.retain_dates(&common);
            hi.retain_dates(&common);
        }
    }

    if metric1.is_empty() || metric1.is_all_nan() {
        return None;
    }
    Some(PlotTables {
        metric1,
        metric2,
        counts,
        ci1,
        ci2,
    })
}

// ─── Rendering and saving ────────────────────────────────────────────

/// File name inputs for a prepared plot.
fn save_target(prepared: &PreparedPlot, request: &PlotRequest, config: &PlotConfig) -> SaveTarget {
    let level = vxts_core::domain::level_info(
        &config.run.verif_type,
        &request.fcst_level,
        &prepared.fcst_var,
    );
    let domain = crate::labels::domain_info(&request.vx_mask, &config.domains);
    let thresh = prepared.thresh.as_ref().map(|t| t.save_phrase());
    let parts = SaveNameParts {
        header: &config.run.img_header,
        metric1: prepared.metric1,
        metric2: prepared.metric2,
        thresh: thresh.as_deref(),
        width: &prepared.width.save,
        var: &prepared.fcst_var,
        level: &level.save,
        eval_period: &request.eval_period,
        start: request.start,
        end: request.end,
        date_type: request.date_type,
        date_hours: &prepared.date_hours,
        lead: &prepared.lead.save,
        domain: &domain.save,
    };
    SaveTarget::new(&request.variable.plot_group, &parts)
}

/// Render a prepared plot and write it under the configured save directory.
///
/// Returns the saved path. With a restart directory the PNG is copied
/// there as well; with `export_tables` the tables are written next to it.
pub fn render_time_series(
    prepared: &PreparedPlot,
    request: &PlotRequest,
    config: &PlotConfig,
) -> Result<PathBuf, PlotError> {
    let figure = build_figure(prepared, request, config);
    let target = save_target(prepared, request, config);
    let path = target.prepare(&config.run.save_dir)?;
    render_png(&figure, &path)?;
    if let Some(restart) = &config.run.restart_dir {
        let copied = target.copy_to_restart(&path, restart)?;
        info!("Copied plot to restart directory: {}", copied.display());
    }
    if config.settings.export_tables {
        export_tables(prepared, request, config, &path)?;
    }
    info!("\u{2713} plot saved successfully as {}", path.display());
    Ok(path)
}

/// Prepare and render one plot; `Ok(None)` when it was skipped.
pub fn plot_time_series(
    records: Vec<StatRecord>,
    request: &PlotRequest,
    config: &PlotConfig,
    seeds: &BootstrapSeeds,
) -> Result<Option<PathBuf>, PlotError> {
    info!(
        "Plotting {} time series for {} {} over {}",
        request.metric1, request.variable.name, request.fcst_level, request.vx_mask
    );
    let Some(prepared) = prepare_time_series(records, request, config, seeds)? else {
        return Ok(None);
    };
    render_time_series(&prepared, request, config).map(Some)
}
