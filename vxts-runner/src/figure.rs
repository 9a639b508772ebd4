//! Backend-independent description of a time-series figure.
//!
//! [`build_figure`] decides everything that ends up on the canvas: which
//! series are drawn and how, error bars, the legend, titles, axes, sample
//! counts, and logos. The renderer only turns this into pixels.

use std::path::PathBuf;

use crate::axis::{XAxis, YAxis, YLimits};
use crate::config::{LineStyle, LogoSpec, Marker, PlotConfig};
use crate::labels::{domain_info, format_mean, y_label, TitleParts, Titles};
use crate::pivot::{nan_mean, PivotTable};
use crate::reference::ReferenceLine;
use crate::timeseries::{CiTables, PlotRequest, PreparedPlot};

pub type Rgb = (u8, u8, u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dash {
    Solid,
    Dashed,
}

/// Drawing style shared by series and legend entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Rgb,
    pub dash: Dash,
    pub width: u32,
    pub marker: Marker,
    pub marker_size: u32,
}

impl Stroke {
    fn from_style(style: &LineStyle, dash: Dash) -> Self {
        Self {
            color: style.rgb(),
            dash,
            width: style.linewidth.max(1),
            marker: style.marker,
            marker_size: style.markersize,
        }
    }
}

/// One vertical error bar at x position `x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorBar {
    pub x: f64,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

/// A drawn line. `x` is the position on the date axis (0-based index).
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub stroke: Stroke,
    /// Contiguous runs of finite points; NaN values split the line.
    pub segments: Vec<Vec<(f64, f64)>>,
    pub error_bars: Vec<ErrorBar>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub stroke: Stroke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoSide {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Logo {
    pub side: LogoSide,
    pub path: PathBuf,
    pub zoom: f64,
}

/// Everything needed to draw one plot.
#[derive(Debug, Clone, PartialEq)]
pub struct FigureSpec {
    pub width: u32,
    pub height: u32,
    pub titles: Titles,
    pub x_axis: XAxis,
    pub x_label: String,
    pub y_axis: YAxis,
    pub y_label: String,
    pub series: Vec<Series>,
    pub legend: Vec<LegendEntry>,
    pub zero_line: bool,
    pub grid: bool,
    /// Sample count label per x position; `None` when not equalized.
    pub counts: Option<Vec<String>>,
    pub logos: Vec<Logo>,
}

const BLACK: Rgb = (0, 0, 0);

/// Split values into finite runs keyed by position.
pub fn segments(values: &[f64]) -> Vec<Vec<(f64, f64)>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for (i, v) in values.iter().enumerate() {
        if v.is_finite() {
            current.push((i as f64, *v));
        } else if !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn error_bars(values: &[f64], ci: Option<(&[f64], &[f64])>) -> Vec<ErrorBar> {
    let Some((lo, hi)) = ci else {
        return Vec::new();
    };
    values
        .iter()
        .zip(lo.iter().zip(hi))
        .enumerate()
        .filter(|(_, (v, (l, h)))| v.is_finite() && l.is_finite() && h.is_finite())
        .map(|(i, (v, (l, h)))| ErrorBar {
            x: i as f64,
            value: *v,
            lower: v - l.abs(),
            upper: v + h,
        })
        .collect()
}

fn ci_columns(ci: Option<&CiTables>, model: &str) -> Option<(Vec<f64>, Vec<f64>)> {
    let (lo, hi) = ci?;
    Some((lo.column(model)?, hi.column(model)?))
}

fn series(values: &[f64], ci: Option<(Vec<f64>, Vec<f64>)>, stroke: Stroke) -> Series {
    Series {
        stroke,
        segments: segments(values),
        error_bars: error_bars(
            values,
            ci.as_ref().map(|(lo, hi)| (lo.as_slice(), hi.as_slice())),
        ),
    }
}

fn reference_series(reference: &ReferenceLine, stroke: Stroke) -> Series {
    series(&reference.values, reference.ci.clone(), stroke)
}

/// Average sample count per date, as integer text.
fn count_labels(counts: &PivotTable) -> Vec<String> {
    counts
        .row_means()
        .into_iter()
        .map(|c| {
            if c.is_finite() {
                format!("{}", c as i64)
            } else {
                String::new()
            }
        })
        .collect()
}

fn logos(config: &PlotConfig) -> Vec<Logo> {
    let logo = |side, spec: &LogoSpec| {
        spec.enabled.then(|| Logo {
            side,
            path: spec.path.clone(),
            zoom: spec.zoom,
        })
    };
    [
        logo(LogoSide::Left, &config.logos.left),
        logo(LogoSide::Right, &config.logos.right),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Build the figure for a prepared plot.
pub fn build_figure(prepared: &PreparedPlot, request: &PlotRequest, config: &PlotConfig) -> FigureSpec {
    let settings = &config.settings;
    let tables = &prepared.tables;
    let obs = |dash| Stroke::from_style(&config.obs_style, dash);

    let mut legend = Vec::new();
    if let Some(m2) = prepared.metric2 {
        let metric_entry = |name: &str, has_ref: bool, dash: Dash| LegendEntry {
            label: name.to_string(),
            stroke: Stroke {
                color: if has_ref { config.obs_style.rgb() } else { BLACK },
                dash,
                width: 5,
                marker: Marker::None,
                marker_size: 0,
            },
        };
        legend.push(metric_entry(
            prepared.metric1.name(),
            prepared.reference1.is_some(),
            Dash::Solid,
        ));
        legend.push(metric_entry(m2.name(), prepared.reference2.is_some(), Dash::Dashed));
    }

    let mut limits = YLimits::new(settings.y_min_limit, settings.y_max_limit, settings.y_lim_lock);
    let mut drawn = Vec::new();
    if let Some(r) = &prepared.reference1 {
        drawn.push(reference_series(r, obs(Dash::Solid)));
    }
    if let Some(r) = &prepared.reference2 {
        drawn.push(reference_series(r, obs(Dash::Dashed)));
    }

    for (index, model) in prepared.models.iter().enumerate() {
        let Some(values1) = tables.metric1.column(model) else {
            continue;
        };
        let style = config.model_style(model, index);
        let values2 = tables.metric2.as_ref().and_then(|t| t.column(model));
        limits.observe(&values1);
        if let Some(v2) = &values2 {
            limits.observe(v2);
        }

        if prepared.reference1.is_none() {
            drawn.push(series(
                &values1,
                ci_columns(tables.ci1.as_ref(), model),
                Stroke::from_style(&style.style, Dash::Solid),
            ));
        }
        if let (Some(v2), None) = (&values2, &prepared.reference2) {
            drawn.push(series(
                v2,
                ci_columns(tables.ci2.as_ref(), model),
                Stroke::from_style(&style.style, Dash::Dashed),
            ));
        }

        let mut label = style.display_name().to_string();
        if settings.display_averages {
            let means: Vec<String> = std::iter::once(nan_mean(&values1))
                .chain(values2.as_deref().map(nan_mean))
                .map(format_mean)
                .collect();
            label = format!("{label} ({})", means.join(", "));
        }
        legend.push(LegendEntry {
            label,
            stroke: Stroke::from_style(&style.style, Dash::Solid),
        });
    }

    let level = vxts_core::domain::level_info(
        &config.run.verif_type,
        &request.fcst_level,
        &prepared.fcst_var,
    );
    let domain = domain_info(&request.vx_mask, &config.domains);
    let thresholds = prepared.thresh.as_ref().map(|t| t.display_phrase());
    let titles = Titles::new(&TitleParts {
        metric1: prepared.metric1,
        metric2: prepared.metric2,
        width: &prepared.width.display,
        level: &level,
        var_long_name: &request.variable.long_name,
        thresholds: thresholds.as_deref(),
        units: &prepared.units,
        domain: &domain.display,
        date_type: request.date_type,
        date_hours: &prepared.date_hours,
        start: request.start,
        end: request.end,
        lead_phrase: &prepared.lead.display,
    });

    FigureSpec {
        width: 16 * settings.dpi,
        height: 8 * settings.dpi,
        titles,
        x_axis: XAxis::new(prepared.dates(), settings.aggregate_dates_by),
        x_label: request.date_type.axis_label().to_string(),
        y_axis: YAxis::from_bounds(limits.bounds()),
        y_label: y_label(prepared.metric1, prepared.metric2, &prepared.units),
        series: drawn,
        legend,
        zero_line: true,
        grid: true,
        counts: prepared.equalized.then(|| count_labels(&tables.counts)),
        logos: logos(config),
    }
}
