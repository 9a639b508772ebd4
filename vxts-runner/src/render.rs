//! PNG rendering of a [`FigureSpec`] with plotters.
//!
//! The canvas is split into three bands: titles and logos on top, the
//! chart in the middle, the legend below. Ticks and grid lines come from
//! the figure's resolved axes, so the chart mesh itself draws only the
//! axis lines and descriptions.

use std::path::Path;

use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use thiserror::Error;
use tracing::warn;

use crate::config::Marker;
use crate::figure::{Dash, FigureSpec, Logo, LogoSide, Series, Stroke};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("figure has no dates to draw")]
    EmptyAxis,
    #[error("drawing failed: {0}")]
    Draw(String),
}

fn draw_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

type Chart<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

const FONT: &str = "sans-serif";
const LEGEND_COLUMNS: usize = 4;
const GRID: RGBColor = RGBColor(200, 200, 200);

/// Font size scaled to the canvas height.
fn font_px(height: u32, fraction: f64) -> u32 {
    ((height as f64 * fraction).round() as u32).max(8)
}

fn rgb(stroke: &Stroke) -> RGBColor {
    let (r, g, b) = stroke.color;
    RGBColor(r, g, b)
}

/// Draw `figure` into a PNG at `path`.
pub fn render_png(figure: &FigureSpec, path: &Path) -> Result<(), RenderError> {
    if figure.x_axis.ticks.is_empty() {
        return Err(RenderError::EmptyAxis);
    }
    let (w, h) = (figure.width, figure.height);
    let root = BitMapBackend::new(path, (w, h)).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let title_h = h * 16 / 100;
    let legend_rows = figure.legend.len().div_ceil(LEGEND_COLUMNS).max(1) as u32;
    let legend_h = (h * 5 / 100) * legend_rows + h * 3 / 100;
    let (top, rest) = root.split_vertically(title_h);
    let (chart_area, legend_area) = rest.split_vertically(h - title_h - legend_h);

    draw_titles(&top, figure)?;
    for logo in &figure.logos {
        draw_logo(&top, logo, w, title_h);
    }

    let n = figure.x_axis.ticks.len() as f64;
    let label_px = font_px(h, 0.022);
    let mut chart = ChartBuilder::on(&chart_area)
        .margin(25)
        .margin_top(h / 30)
        .set_label_area_size(LabelAreaPosition::Left, w / 18)
        .set_label_area_size(LabelAreaPosition::Bottom, h / 12)
        .build_cartesian_2d(-0.5..(n - 0.5), figure.y_axis.min..figure.y_axis.max)
        .map_err(draw_err)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(0)
        .y_labels(0)
        .x_desc(figure.x_label.as_str())
        .y_desc(figure.y_label.as_str())
        .axis_desc_style((FONT, label_px))
        .draw()
        .map_err(draw_err)?;

    if figure.grid {
        draw_grid(&mut chart, figure)?;
    }
    if figure.zero_line && figure.y_axis.min < 0.0 && figure.y_axis.max > 0.0 {
        chart
            .draw_series(DashedLineSeries::new(
                [(-0.5, 0.0), (n - 0.5, 0.0)],
                8,
                6,
                BLACK.stroke_width(2),
            ))
            .map_err(draw_err)?;
    }
    draw_ticks(&root, &chart, figure, label_px)?;

    for series in &figure.series {
        draw_error_bars(&mut chart, series)?;
    }
    for series in &figure.series {
        draw_series(&mut chart, series)?;
    }
    if let Some(counts) = &figure.counts {
        draw_counts(&root, &chart, figure, counts, font_px(h, 0.016))?;
    }

    draw_legend(&legend_area, figure, font_px(h, 0.02))?;
    root.present().map_err(draw_err)?;
    Ok(())
}

// ─── Title band ──────────────────────────────────────────────────────

fn draw_titles(
    area: &DrawingArea<BitMapBackend<'_>, plotters::coord::Shift>,
    figure: &FigureSpec,
) -> Result<(), RenderError> {
    let (w, h) = area.dim_in_pixel();
    let size = font_px(figure.height, 0.026);
    let style = TextStyle::from((FONT, size).into_font())
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Top));
    let line_h = (h / 4) as i32;
    for (i, line) in figure.titles.lines.iter().enumerate() {
        let y = line_h / 2 + i as i32 * line_h;
        area.draw(&Text::new(line.as_str(), ((w / 2) as i32, y), style.clone()))
            .map_err(draw_err)?;
    }
    Ok(())
}

/// Draw a logo scaled by its zoom; unreadable images are skipped.
fn draw_logo(
    area: &DrawingArea<BitMapBackend<'_>, plotters::coord::Shift>,
    logo: &Logo,
    canvas_w: u32,
    band_h: u32,
) {
    if !logo.path.exists() {
        warn!(path = %logo.path.display(), "logo image not found; skipping");
        return;
    }
    let img = match image::open(&logo.path) {
        Ok(img) => img,
        Err(e) => {
            warn!(path = %logo.path.display(), error = %e, "logo image unreadable; skipping");
            return;
        }
    };
    let scale = logo.zoom.max(0.0);
    let max_h = band_h.saturating_sub(4).max(1);
    let lw = ((img.width() as f64 * scale).round() as u32).max(1);
    let lh = ((img.height() as f64 * scale).round() as u32).clamp(1, max_h);
    let img = img.resize(lw, lh, image::imageops::FilterType::Triangle);
    let x = match logo.side {
        LogoSide::Left => 10,
        LogoSide::Right => canvas_w.saturating_sub(img.width() + 10) as i32,
    };
    let element: BitMapElement<_> = ((x, 2), img).into();
    if let Err(e) = area.draw(&element) {
        warn!(path = %logo.path.display(), error = %e, "failed to draw logo");
    }
}

// ─── Chart ───────────────────────────────────────────────────────────

fn draw_grid(chart: &mut Chart<'_, '_>, figure: &FigureSpec) -> Result<(), RenderError> {
    let n = figure.x_axis.ticks.len() as f64;
    let style = GRID.stroke_width(1);
    for y in &figure.y_axis.ticks {
        chart
            .draw_series(DashedLineSeries::new([(-0.5, *y), (n - 0.5, *y)], 4, 4, style))
            .map_err(draw_err)?;
    }
    let (y0, y1) = (figure.y_axis.min, figure.y_axis.max);
    for (i, label) in figure.x_axis.labels.iter().enumerate() {
        if label.is_empty() {
            continue;
        }
        let x = i as f64;
        chart
            .draw_series(DashedLineSeries::new([(x, y0), (x, y1)], 4, 4, style))
            .map_err(draw_err)?;
    }
    Ok(())
}

fn draw_ticks(
    root: &DrawingArea<BitMapBackend<'_>, plotters::coord::Shift>,
    chart: &Chart<'_, '_>,
    figure: &FigureSpec,
    label_px: u32,
) -> Result<(), RenderError> {
    let left = -0.5;
    let bottom = figure.y_axis.min;
    let font = (FONT, label_px).into_font().color(&BLACK);

    for (y, label) in figure.y_axis.ticks.iter().zip(&figure.y_axis.labels) {
        let (px, py) = chart.backend_coord(&(left, *y));
        root.draw(&PathElement::new(vec![(px - 6, py), (px, py)], BLACK.stroke_width(1)))
            .map_err(draw_err)?;
        if !label.is_empty() {
            let style = font.pos(Pos::new(HPos::Right, VPos::Center));
            root.draw(&Text::new(label.as_str(), (px - 10, py), style))
                .map_err(draw_err)?;
        }
    }

    for (i, label) in figure.x_axis.labels.iter().enumerate() {
        let (px, py) = chart.backend_coord(&(i as f64, bottom));
        let len = if label.is_empty() { 3 } else { 6 };
        root.draw(&PathElement::new(vec![(px, py), (px, py + len)], BLACK.stroke_width(1)))
            .map_err(draw_err)?;
        if !label.is_empty() {
            let style = font.pos(Pos::new(HPos::Center, VPos::Top));
            root.draw(&Text::new(label.as_str(), (px, py + 10), style))
                .map_err(draw_err)?;
        }
    }
    Ok(())
}

fn draw_error_bars(chart: &mut Chart<'_, '_>, series: &Series) -> Result<(), RenderError> {
    if series.error_bars.is_empty() {
        return Ok(());
    }
    let style = rgb(&series.stroke).mix(0.75).stroke_width(series.stroke.width.max(1));
    chart
        .draw_series(
            series
                .error_bars
                .iter()
                .map(|b| ErrorBar::new_vertical(b.x, b.lower, b.value, b.upper, style, 8)),
        )
        .map_err(draw_err)?;
    Ok(())
}

fn draw_series(chart: &mut Chart<'_, '_>, series: &Series) -> Result<(), RenderError> {
    let color = rgb(&series.stroke);
    let line = color.stroke_width(series.stroke.width);
    for seg in &series.segments {
        match series.stroke.dash {
            Dash::Solid => {
                chart
                    .draw_series(LineSeries::new(seg.iter().copied(), line))
                    .map_err(draw_err)?;
            }
            Dash::Dashed => {
                chart
                    .draw_series(DashedLineSeries::new(seg.iter().copied(), 12, 8, line))
                    .map_err(draw_err)?;
            }
        }
    }
    let points = series.segments.iter().flatten().copied();
    draw_markers(chart, points, &series.stroke)
}

fn draw_markers<I>(chart: &mut Chart<'_, '_>, points: I, stroke: &Stroke) -> Result<(), RenderError>
where
    I: Iterator<Item = (f64, f64)>,
{
    let size = stroke.marker_size as i32;
    if size == 0 {
        return Ok(());
    }
    let filled = rgb(stroke).filled();
    let outline = rgb(stroke).stroke_width(2);
    match stroke.marker {
        Marker::None => {}
        Marker::Circle => {
            chart
                .draw_series(points.map(|p| Circle::new(p, size, filled)))
                .map_err(draw_err)?;
        }
        Marker::Square => {
            chart
                .draw_series(points.map(|p| {
                    EmptyElement::at(p) + Rectangle::new([(-size, -size), (size, size)], filled)
                }))
                .map_err(draw_err)?;
        }
        Marker::Triangle => {
            chart
                .draw_series(points.map(|p| TriangleMarker::new(p, size, filled)))
                .map_err(draw_err)?;
        }
        Marker::Cross => {
            chart
                .draw_series(points.map(|p| Cross::new(p, size, outline)))
                .map_err(draw_err)?;
        }
    }
    Ok(())
}

/// Sample counts above the plotting area, led by a `#SAMPLES` caption.
fn draw_counts(
    root: &DrawingArea<BitMapBackend<'_>, plotters::coord::Shift>,
    chart: &Chart<'_, '_>,
    figure: &FigureSpec,
    counts: &[String],
    size: u32,
) -> Result<(), RenderError> {
    let top = figure.y_axis.max;
    let style = (FONT, size)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Bottom));
    for (i, count) in counts.iter().enumerate() {
        if count.is_empty() || figure.x_axis.labels.get(i).is_some_and(String::is_empty) {
            continue;
        }
        let (px, py) = chart.backend_coord(&(i as f64, top));
        root.draw(&Text::new(count.as_str(), (px, py - 4), style.clone()))
            .map_err(draw_err)?;
    }
    let (px, py) = chart.backend_coord(&(-0.5, top));
    let caption = style.pos(Pos::new(HPos::Right, VPos::Bottom));
    root.draw(&Text::new("#SAMPLES", (px - 8, py - 4), caption))
        .map_err(draw_err)?;
    Ok(())
}

// ─── Legend band ─────────────────────────────────────────────────────

fn draw_legend(
    area: &DrawingArea<BitMapBackend<'_>, plotters::coord::Shift>,
    figure: &FigureSpec,
    size: u32,
) -> Result<(), RenderError> {
    if figure.legend.is_empty() {
        return Ok(());
    }
    let (w, h) = area.dim_in_pixel();
    let rows = figure.legend.len().div_ceil(LEGEND_COLUMNS).max(1);
    let cols = figure.legend.len().min(LEGEND_COLUMNS);
    let col_w = (w as usize * 9 / 10 / LEGEND_COLUMNS) as i32;
    let row_h = (h as usize / (rows + 1)) as i32;
    let x0 = (w as i32 - col_w * cols as i32) / 2;
    let sample = 40;
    let text = (FONT, size)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Left, VPos::Center));

    for (i, entry) in figure.legend.iter().enumerate() {
        let x = x0 + (i % LEGEND_COLUMNS) as i32 * col_w;
        let y = row_h / 2 + (i / LEGEND_COLUMNS) as i32 * row_h + row_h / 2;
        let line = rgb(&entry.stroke).stroke_width(entry.stroke.width.max(1));
        match entry.stroke.dash {
            Dash::Solid => area
                .draw(&PathElement::new(vec![(x, y), (x + sample, y)], line))
                .map_err(draw_err)?,
            Dash::Dashed => {
                for (a, b) in [(0, 12), (20, 32)] {
                    area.draw(&PathElement::new(vec![(x + a, y), (x + b, y)], line))
                        .map_err(draw_err)?;
                }
            }
        }
        let m = entry.stroke.marker_size as i32;
        let mid = (x + sample / 2, y);
        let filled = rgb(&entry.stroke).filled();
        match entry.stroke.marker {
            _ if m == 0 => {}
            Marker::None => {}
            Marker::Circle => area.draw(&Circle::new(mid, m, filled)).map_err(draw_err)?,
            Marker::Square => area
                .draw(&Rectangle::new([(mid.0 - m, mid.1 - m), (mid.0 + m, mid.1 + m)], filled))
                .map_err(draw_err)?,
            Marker::Triangle => area
                .draw(&TriangleMarker::new(mid, m, filled))
                .map_err(draw_err)?,
            Marker::Cross => area
                .draw(&Cross::new(mid, m, rgb(&entry.stroke).stroke_width(2)))
                .map_err(draw_err)?,
        }
        area.draw(&Text::new(entry.label.as_str(), (x + sample + 8, y), text.clone()))
            .map_err(draw_err)?;
    }
    Ok(())
}
