//! vxts runner: from loaded statistics to saved time-series plots.
//!
//! This crate builds on `vxts-core` to provide:
//! - TOML configuration with a variable catalog and plotting toggles
//! - The filter chain, sample equalization, and metric computation
//! - Grouped aggregation with bootstrap confidence intervals
//! - Pivot tables, reference-line detection, axes, and labels
//! - Figure building, PNG rendering, file naming, and table export
//! - The batch driver that plots every variable × level × domain

pub mod aggregate;
pub mod axis;
pub mod bootstrap;
pub mod config;
pub mod driver;
pub mod equalize;
pub mod export;
pub mod figure;
pub mod filters;
pub mod labels;
pub mod metrics;
pub mod naming;
pub mod pivot;
pub mod reference;
pub mod render;
pub mod timeseries;

#[cfg(test)]
mod testutil;

pub use aggregate::{aggregate, AggregateError, AggregateRequest, AggregatedRow, DateBin};
pub use bootstrap::{BootstrapConfig, BootstrapMethod};
pub use config::{ConfigError, PlotConfig, PlotSettings, VariableSpec};
pub use driver::{run, run_plan, DriverError, RunPlan, RunSummary};
pub use equalize::{equalize_samples, Equalized};
pub use export::{export_tables, PlotManifest};
pub use figure::{build_figure, FigureSpec};
pub use filters::FilterError;
pub use metrics::{Metric, UnknownMetric};
pub use naming::{NamingError, SaveNameParts, SaveTarget};
pub use pivot::PivotTable;
pub use reference::{detect_reference, ReferenceLine};
pub use render::{render_png, RenderError};
pub use timeseries::{
    plot_time_series, prepare_time_series, render_time_series, PlotError, PlotRequest,
    PreparedPlot,
};
