use std::error::Error;

use ndarray::{Array2, ArrayView2};
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;

use crate::args::{AverageType, ImageFormat, LegendLocation, PlotConfig, PlotType};
use crate::colormap::{self, Colormap};
use crate::layout::{self, AxisMode, GridDescriptor};
use crate::matrix::{SignalMatrix, SortCriterion, SortMethod};
use crate::scaling::ColorBounds;
use crate::ticks::{self, TickSet};

const DPI: f64 = 200.0;
const PX_PER_UNIT: f64 = DPI / 2.54;
const OUTER_MARGIN: i32 = 10;

const X_LABEL_AREA: i32 = 30;
const Y_LABEL_AREA: i32 = 18;
const PROFILE_X_AREA: i32 = 22;
const PROFILE_Y_AREA: i32 = 42;

type Chart2d<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Render the grouped matrix as the composite figure and persist it to the
/// configured output path.
pub fn plot_matrix(
    hm: &SignalMatrix,
    cfg: &PlotConfig,
    bounds: ColorBounds,
) -> Result<(), Box<dyn Error>> {
    let grid = layout::build_grid(
        &hm.group_sizes(),
        hm.num_samples(),
        cfg.heatmap_width,
        cfg.heatmap_height,
        cfg.what_to_show.show_profile(),
        cfg.what_to_show.show_colorbar(),
        AxisMode::from_per_group(cfg.per_group),
    )?;
    let (width, height) = grid.canvas_size(PX_PER_UNIT);

    match cfg.format {
        ImageFormat::Png => {
            let root = BitMapBackend::new(&cfg.out_file, (width, height)).into_drawing_area();
            compose(&root, hm, cfg, &grid, bounds)?;
            root.present()?;
        }
        ImageFormat::Svg => {
            let root = SVGBackend::new(&cfg.out_file, (width, height)).into_drawing_area();
            compose(&root, hm, cfg, &grid, bounds)?;
            root.present()?;
        }
    }
    Ok(())
}

fn compose<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    hm: &SignalMatrix,
    cfg: &PlotConfig,
    grid: &GridDescriptor,
    bounds: ColorBounds,
) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let inner = if cfg.plot_title.is_empty() {
        root.margin(OUTER_MARGIN, OUTER_MARGIN, OUTER_MARGIN, OUTER_MARGIN)
    } else {
        root.titled(&cfg.plot_title, ("sans-serif", 28))?.margin(
            OUTER_MARGIN,
            OUTER_MARGIN,
            OUTER_MARGIN,
            OUTER_MARGIN,
        )
    };
    let (area_w, area_h) = inner.dim_in_pixel();
    let cells =
        inner.split_by_breakpoints(grid.col_breakpoints(area_w), grid.row_breakpoints(area_h));

    // 1. Heatmap panels
    let ticks_heat = ticks::heatmap_ticks(
        &hm.parameters,
        &cfg.ref_point_label,
        &cfg.start_label,
        &cfg.end_label,
    );
    let boundary_bins = region_length_bins(hm);
    let n_groups = hm.num_groups();
    let n_samples = hm.num_samples();
    let mut last_bounds = (0.0, 1.0);
    for sample in 0..n_samples {
        for group in 0..n_groups {
            let sub = hm.get_submatrix(group, sample);
            let (row, col) = grid.panel_cell(group, sample);
            let cell = &cells[row * grid.cols + col];
            let deco = panel_decor(
                grid,
                cfg,
                group,
                sample,
                n_groups,
                n_samples,
                sub.group_label,
                sub.sample_label,
            );
            let vb = effective_bounds(&sub.matrix, bounds);
            draw_heatmap_panel(
                cell,
                &sub.matrix,
                vb,
                cfg,
                &deco,
                &ticks_heat,
                boundary_bins.as_ref().map(|g| g[group].as_slice()),
            )?;
            last_bounds = vb;
        }
    }

    // 2. Summary profiles
    if grid.show_profile {
        draw_profiles(&cells, grid, hm, cfg)?;
    }

    // 3. Colorbar
    if grid.show_colorbar {
        draw_colorbar(&inner, grid, cfg, last_bounds)?;
    }

    Ok(())
}

struct PanelDecor {
    title: Option<String>,
    y_label: Option<String>,
    x_ticks: bool,
    x_desc: Option<String>,
}

/// Which heatmap panel carries the sample title: only the top row, and only
/// when no profile row already titles the columns.
pub(crate) fn is_title_panel(axis: AxisMode, show_profile: bool, group: usize) -> bool {
    axis == AxisMode::GroupMajor && !show_profile && group == 0
}

#[allow(clippy::too_many_arguments)]
fn panel_decor(
    grid: &GridDescriptor,
    cfg: &PlotConfig,
    group: usize,
    sample: usize,
    n_groups: usize,
    n_samples: usize,
    group_label: &str,
    sample_label: &str,
) -> PanelDecor {
    match grid.axis {
        AxisMode::GroupMajor => {
            let bottom = group == n_groups - 1;
            PanelDecor {
                title: is_title_panel(grid.axis, grid.show_profile, group)
                    .then(|| sample_label.to_string()),
                y_label: (sample == 0).then(|| group_label.to_string()),
                x_ticks: bottom,
                x_desc: (bottom && !cfg.x_axis_label.is_empty())
                    .then(|| cfg.x_axis_label.clone()),
            }
        }
        AxisMode::SampleMajor => {
            let bottom = sample == n_samples - 1;
            PanelDecor {
                title: None,
                y_label: (group == 0).then(|| sample_label.to_string()),
                x_ticks: bottom,
                x_desc: bottom.then(|| group_label.to_string()),
            }
        }
    }
}

fn draw_heatmap_panel<DB: DrawingBackend>(
    cell: &DrawingArea<DB, Shift>,
    sub: &ArrayView2<f64>,
    vbounds: (f64, f64),
    cfg: &PlotConfig,
    deco: &PanelDecor,
    ticks: &TickSet,
    boundary: Option<&[f64]>,
) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    let (rows, cols) = sub.dim();
    if rows == 0 || cols == 0 {
        return Ok(());
    }
    let nrows = rows as f64;
    let ncols = cols as f64;

    let mut builder = ChartBuilder::on(cell);
    builder
        .margin(1)
        .x_label_area_size(if deco.x_ticks { X_LABEL_AREA } else { 0 })
        .y_label_area_size(if deco.y_label.is_some() { Y_LABEL_AREA } else { 0 });
    if let Some(title) = &deco.title {
        builder.caption(title, ("sans-serif", 16));
    }
    let mut chart = builder.build_cartesian_2d(0.0..ncols, 0.0..nrows)?;

    let (cell_x, cell_y) = cell.get_pixel_range();
    let (plot_x, plot_y) = chart.plotting_area().get_pixel_range();

    let (vmin, vmax) = vbounds;
    let span = vmax - vmin;

    // cubic interpolation only pays off on large matrices; everything else
    // keeps the crisp one-cell-one-rectangle rendering
    let plot_w = plot_x.len().max(1) as usize;
    let plot_h = plot_y.len().max(1) as usize;
    let (data, draw_rows, draw_cols) = if rows > 200 && cols > 1000 {
        let out_rows = rows.min(plot_h);
        let out_cols = cols.min(plot_w);
        (resample_cubic(sub, out_rows, out_cols), out_rows, out_cols)
    } else {
        (sub.to_owned(), rows, cols)
    };

    let x_step = ncols / draw_cols as f64;
    let y_step = nrows / draw_rows as f64;
    for i in 0..draw_rows {
        chart.draw_series((0..draw_cols).map(|j| {
            let color = cell_color(
                data[[i, j]],
                vmin,
                span,
                &cfg.color_map,
                cfg.missing_data_color,
            );
            Rectangle::new(
                [
                    (j as f64 * x_step, nrows - i as f64 * y_step),
                    ((j + 1) as f64 * x_step, nrows - (i + 1) as f64 * y_step),
                ],
                color.filled(),
            )
        }))?;
    }

    // dashed border at the end of each region when sorted by length
    if let Some(lens) = boundary {
        let pts: Vec<(f64, f64)> = lens
            .iter()
            .enumerate()
            .map(|(i, &x)| (x.min(ncols), nrows - i as f64 - 0.5))
            .collect();
        chart.draw_series(DashedLineSeries::new(pts, 3, 2, BLACK.stroke_width(1)))?;
    }

    chart.draw_series(std::iter::once(Rectangle::new(
        [(0.0, 0.0), (ncols, nrows)],
        BLACK.stroke_width(1),
    )))?;

    if let Some(label) = &deco.y_label {
        let style = TextStyle::from(
            ("sans-serif", 14)
                .into_font()
                .transform(FontTransform::Rotate270),
        )
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Center));
        let x = (plot_x.start - cell_x.start - Y_LABEL_AREA / 2).max(0);
        let y = (plot_y.start + plot_y.end) / 2 - cell_y.start;
        cell.draw(&Text::new(label.clone(), (x, y), style))?;
    }

    if deco.x_ticks {
        draw_x_ticks(cell, &chart, ticks, 0.0, 12.0)?;
        if let Some(desc) = &deco.x_desc {
            let style = TextStyle::from(("sans-serif", 13).into_font())
                .color(&BLACK)
                .pos(Pos::new(HPos::Center, VPos::Top));
            let x = (plot_x.start + plot_x.end) / 2 - cell_x.start;
            let y = plot_y.end - cell_y.start + 15;
            cell.draw(&Text::new(desc.clone(), (x, y), style))?;
        }
    }

    Ok(())
}

fn draw_profiles<DB: DrawingBackend>(
    cells: &[DrawingArea<DB, Shift>],
    grid: &GridDescriptor,
    hm: &SignalMatrix,
    cfg: &PlotConfig,
) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    let (panels, lines) = match grid.axis {
        AxisMode::GroupMajor => (hm.num_samples(), hm.num_groups()),
        AxisMode::SampleMajor => (hm.num_groups(), hm.num_samples()),
    };
    let nbins = hm.bins_per_sample() as f64;
    let ticks_profile = ticks::profile_ticks(
        &hm.parameters,
        &cfg.ref_point_label,
        &cfg.start_label,
        &cfg.end_label,
    );

    // aggregate every curve first so all panels can share one y scale
    let mut curves: Vec<Vec<ProfileCurve>> = Vec::with_capacity(panels);
    for p in 0..panels {
        let mut panel_curves = Vec::with_capacity(lines);
        for l in 0..lines {
            let sub = match grid.axis {
                AxisMode::GroupMajor => hm.get_submatrix(l, p),
                AxisMode::SampleMajor => hm.get_submatrix(p, l),
            };
            panel_curves.push(ProfileCurve {
                avg: column_profile(&sub.matrix, cfg.average_type),
                std: column_profile(&sub.matrix, AverageType::Std),
            });
        }
        curves.push(panel_curves);
    }

    let (mut y_lo, mut y_hi) = envelope(&curves);
    if let Some(v) = cfg.y_min {
        y_lo = v;
    }
    if let Some(v) = cfg.y_max {
        y_hi = v;
    }
    if y_hi <= y_lo {
        y_hi = y_lo + 1.0;
    }

    let legend_on = cfg.legend_location != LegendLocation::None;
    for p in 0..panels {
        let cell = &cells[p];
        let title = match grid.axis {
            AxisMode::GroupMajor => &hm.sample_labels()[p],
            AxisMode::SampleMajor => &hm.group_labels()[p],
        };
        let first = p == 0;
        let last = p == panels - 1;

        let mut builder = ChartBuilder::on(cell);
        builder
            .caption(title, ("sans-serif", 16))
            .margin(2)
            .x_label_area_size(PROFILE_X_AREA)
            .y_label_area_size(if first { PROFILE_Y_AREA } else { 6 });
        let mut chart = builder.build_cartesian_2d(0.0..nbins, y_lo..y_hi)?;

        {
            let y_fmt = |v: &f64| format_tick(*v);
            let mut mesh = chart.configure_mesh();
            mesh.disable_x_mesh()
                .disable_y_mesh()
                .disable_x_axis()
                .axis_style(BLACK.stroke_width(1))
                .label_style(("sans-serif", 11));
            if first {
                // half the default label count keeps the shared axis readable
                mesh.y_labels(5).y_label_formatter(&y_fmt);
                if !cfg.y_axis_label.is_empty() {
                    mesh.y_desc(cfg.y_axis_label.as_str());
                }
            } else {
                mesh.y_labels(0);
            }
            mesh.draw()?;
        }

        for (l, curve) in curves[p].iter().enumerate() {
            let color = colormap::categorical(l, lines);
            let label = match grid.axis {
                AxisMode::GroupMajor => hm.group_labels()[l].clone(),
                AxisMode::SampleMajor => hm.sample_labels()[l].clone(),
            };
            let pts: Vec<(f64, f64)> = curve
                .avg
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_finite())
                .map(|(i, &v)| (i as f64 + 0.5, v))
                .collect();

            if cfg.plot_type == PlotType::Std {
                let mut band: Vec<(f64, f64)> = Vec::with_capacity(pts.len() * 2);
                for (i, (&a, &s)) in curve.avg.iter().zip(&curve.std).enumerate() {
                    if a.is_finite() && s.is_finite() {
                        band.push((i as f64 + 0.5, a + s));
                    }
                }
                for (i, (&a, &s)) in curve.avg.iter().zip(&curve.std).enumerate().rev() {
                    if a.is_finite() && s.is_finite() {
                        band.push((i as f64 + 0.5, a - s));
                    }
                }
                chart.draw_series(std::iter::once(Polygon::new(band, color.mix(0.2))))?;
            }

            let anno = match cfg.plot_type {
                PlotType::Fill => chart.draw_series(
                    AreaSeries::new(pts.clone(), 0.0, color.mix(0.4))
                        .border_style(color.stroke_width(1)),
                )?,
                _ => chart.draw_series(LineSeries::new(pts.clone(), color.stroke_width(2)))?,
            };
            if last && legend_on {
                anno.label(label).legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 12, y)], color.stroke_width(2))
                });
            }
        }

        chart.draw_series(std::iter::once(Rectangle::new(
            [(0.0, y_lo), (nbins, y_hi)],
            BLACK.stroke_width(1),
        )))?;

        if last && legend_on {
            chart
                .configure_series_labels()
                .position(legend_position(cfg.legend_location))
                .background_style(&WHITE.mix(0.8))
                .border_style(&TRANSPARENT)
                .label_font(("sans-serif", 11))
                .draw()?;
        }

        draw_x_ticks(cell, &chart, &ticks_profile, y_lo, 11.0)?;
    }

    Ok(())
}

fn draw_colorbar<DB: DrawingBackend>(
    inner: &DrawingArea<DB, Shift>,
    grid: &GridDescriptor,
    cfg: &PlotConfig,
    vbounds: (f64, f64),
) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    let (area_w, area_h) = inner.dim_in_pixel();
    let col_breaks = grid.col_breakpoints(area_w);
    let cbar_x = *col_breaks.last().expect("colorbar implies >= 2 columns");
    let (_, cbar_col) = inner.split_horizontally(cbar_x);
    let cbar = if grid.show_profile {
        // skip the summary-plot and spacer rows
        let row_breaks = grid.row_breakpoints(area_h);
        cbar_col.split_vertically(row_breaks[1]).1
    } else {
        cbar_col
    };

    let (vmin, vmax) = vbounds;
    let span = vmax - vmin;
    let mut chart = ChartBuilder::on(&cbar)
        .margin_top(2)
        .margin_bottom(X_LABEL_AREA)
        .set_label_area_size(LabelAreaPosition::Right, 36)
        .build_cartesian_2d(0.0..1.0, vmin..vmax)?;

    let steps = 100;
    for i in 0..steps {
        let t = i as f64 / (steps - 1) as f64;
        let (r, g, b) = cfg.color_map.eval(t);
        chart.draw_series(std::iter::once(Rectangle::new(
            [
                (0.0, vmin + t * span),
                (1.0, vmin + (t + 1.0 / steps as f64) * span),
            ],
            RGBColor(r, g, b).filled(),
        )))?;
    }

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .disable_x_axis()
        .y_labels(7)
        .label_style(("sans-serif", 11))
        .y_label_formatter(&|v| format_tick(*v))
        .draw()?;

    Ok(())
}

fn draw_x_ticks<DB: DrawingBackend>(
    cell: &DrawingArea<DB, Shift>,
    chart: &Chart2d<'_, DB>,
    ticks: &TickSet,
    y_base: f64,
    font_px: f64,
) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    let (cell_x, cell_y) = cell.get_pixel_range();
    let n = ticks.len();
    for (k, (&pos, label)) in ticks.positions.iter().zip(&ticks.labels).enumerate() {
        let (ax, ay) = chart.backend_coord(&(pos, y_base));
        let (x, y) = (ax - cell_x.start, ay - cell_y.start);
        cell.draw(&PathElement::new(
            vec![(x, y), (x, y + 3)],
            BLACK.stroke_width(1),
        ))?;
        // keep the outermost labels inside the panel
        let hpos = if k == 0 {
            HPos::Left
        } else if k == n - 1 {
            HPos::Right
        } else {
            HPos::Center
        };
        let style = TextStyle::from(("sans-serif", font_px).into_font())
            .color(&BLACK)
            .pos(Pos::new(hpos, VPos::Top));
        cell.draw(&Text::new(label.clone(), (x, y + 4), style))?;
    }
    Ok(())
}

struct ProfileCurve {
    avg: Vec<f64>,
    std: Vec<f64>,
}

/// Column-wise aggregate over the finite values, one entry per bin.
fn column_profile(sub: &ArrayView2<f64>, avg: AverageType) -> Vec<f64> {
    (0..sub.ncols())
        .map(|j| {
            let mut finite: Vec<f64> = sub
                .column(j)
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .collect();
            if finite.is_empty() {
                return f64::NAN;
            }
            let n = finite.len() as f64;
            match avg {
                AverageType::Mean => finite.iter().sum::<f64>() / n,
                AverageType::Median => {
                    finite.sort_by(|a, b| a.total_cmp(b));
                    crate::scaling::percentile_sorted(&finite, 50.0)
                }
                AverageType::Min => finite.iter().copied().fold(f64::INFINITY, f64::min),
                AverageType::Max => finite.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                AverageType::Sum => finite.iter().sum(),
                AverageType::Std => {
                    let mean = finite.iter().sum::<f64>() / n;
                    (finite.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n).sqrt()
                }
            }
        })
        .collect()
}

fn envelope(curves: &[Vec<ProfileCurve>]) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for panel in curves {
        for curve in panel {
            for v in curve.avg.iter().filter(|v| v.is_finite()) {
                lo = lo.min(*v);
                hi = hi.max(*v);
            }
        }
    }
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let span = (hi - lo).max(1e-12);
    (lo - 0.05 * span, hi + 0.05 * span)
}

fn legend_position(loc: LegendLocation) -> SeriesLabelPosition {
    match loc {
        LegendLocation::UpperLeft => SeriesLabelPosition::UpperLeft,
        LegendLocation::UpperCenter => SeriesLabelPosition::UpperMiddle,
        LegendLocation::Best | LegendLocation::UpperRight => SeriesLabelPosition::UpperRight,
        LegendLocation::CenterLeft => SeriesLabelPosition::MiddleLeft,
        LegendLocation::Center => SeriesLabelPosition::MiddleMiddle,
        LegendLocation::CenterRight => SeriesLabelPosition::MiddleRight,
        LegendLocation::LowerLeft => SeriesLabelPosition::LowerLeft,
        LegendLocation::LowerCenter => SeriesLabelPosition::LowerMiddle,
        LegendLocation::LowerRight => SeriesLabelPosition::LowerRight,
        LegendLocation::None => SeriesLabelPosition::UpperRight,
    }
}

fn cell_color(
    v: f64,
    vmin: f64,
    span: f64,
    cmap: &Colormap,
    missing: (u8, u8, u8),
) -> RGBColor {
    if v.is_nan() {
        return RGBColor(missing.0, missing.1, missing.2);
    }
    let t = if span.abs() < f64::EPSILON {
        0.0
    } else {
        ((v - vmin) / span).clamp(0.0, 1.0)
    };
    let (r, g, b) = cmap.eval(t);
    RGBColor(r, g, b)
}

/// Per-panel color bounds: explicit overrides win, otherwise the panel
/// auto-scales to its own finite extrema.
fn effective_bounds(sub: &ArrayView2<f64>, bounds: ColorBounds) -> (f64, f64) {
    let finite = || sub.iter().copied().filter(|v| v.is_finite());
    let vmin = bounds
        .0
        .unwrap_or_else(|| finite().fold(f64::INFINITY, f64::min));
    let vmax = bounds
        .1
        .unwrap_or_else(|| finite().fold(f64::NEG_INFINITY, f64::max));
    if !vmin.is_finite() || !vmax.is_finite() || vmax <= vmin {
        let base = if vmin.is_finite() { vmin } else { 0.0 };
        return (base, base + 1.0);
    }
    (vmin, vmax)
}

/// End-of-signal bin per region, per group, when the matrix is length-sorted
/// in reference-point mode.
fn region_length_bins(hm: &SignalMatrix) -> Option<Vec<Vec<f64>>> {
    if hm.parameters.upstream > 0.0
        && hm.sort_criterion() == SortCriterion::RegionLength
        && hm.sort_method() != SortMethod::No
    {
        let bin = hm.parameters.bin_size;
        let upstream = hm.parameters.upstream;
        Some(
            hm.regions()
                .iter()
                .map(|group| {
                    group
                        .iter()
                        .map(|r| (upstream + r.end.saturating_sub(r.start) as f64) / bin)
                        .collect()
                })
                .collect(),
        )
    } else {
        None
    }
}

/// Separable Catmull-Rom resampling of a matrix to the given output shape.
fn resample_cubic(sub: &ArrayView2<f64>, out_rows: usize, out_cols: usize) -> Array2<f64> {
    let (rows, cols) = sub.dim();
    let mut tmp = Array2::zeros((out_rows, cols));
    for i2 in 0..out_rows {
        let pos = (i2 as f64 + 0.5) * rows as f64 / out_rows as f64 - 0.5;
        for j in 0..cols {
            tmp[[i2, j]] = sample_axis(|i| sub[[i, j]], rows, pos);
        }
    }
    let mut out = Array2::zeros((out_rows, out_cols));
    for j2 in 0..out_cols {
        let pos = (j2 as f64 + 0.5) * cols as f64 / out_cols as f64 - 0.5;
        for i in 0..out_rows {
            out[[i, j2]] = sample_axis(|j| tmp[[i, j]], cols, pos);
        }
    }
    out
}

fn sample_axis(get: impl Fn(usize) -> f64, len: usize, pos: f64) -> f64 {
    let base = pos.floor().clamp(0.0, (len - 1) as f64);
    let t = (pos - base).clamp(0.0, 1.0);
    let i1 = base as isize;
    let tap = |i: isize| get(i.clamp(0, len as isize - 1) as usize);
    let (p0, p1, p2, p3) = (tap(i1 - 1), tap(i1), tap(i1 + 1), tap(i1 + 2));
    if !p0.is_finite() || !p1.is_finite() || !p2.is_finite() || !p3.is_finite() {
        // nearest tap around missing data instead of smearing the nan
        return if t < 0.5 { p1 } else { p2 };
    }
    catmull_rom(p0, p1, p2, p3, t)
}

fn catmull_rom(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let a = 2.0 * p1;
    let b = p2 - p0;
    let c = 2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3;
    let d = -p0 + 3.0 * p1 - 3.0 * p2 + p3;
    0.5 * (a + b * t + c * t * t + d * t * t * t)
}

fn format_tick(v: f64) -> String {
    if v == 0.0 {
        "0".to_string()
    } else if v.abs() >= 1000.0 || v.abs() < 0.01 {
        format!("{:.1e}", v)
    } else {
        format!("{:.2}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn title_panel_is_a_pure_function_of_orientation() {
        assert!(is_title_panel(AxisMode::GroupMajor, false, 0));
        assert!(!is_title_panel(AxisMode::GroupMajor, false, 1));
        assert!(!is_title_panel(AxisMode::GroupMajor, true, 0));
        assert!(!is_title_panel(AxisMode::SampleMajor, false, 0));
    }

    #[test]
    fn column_profile_ignores_missing_values() {
        let m = arr2(&[[1.0, f64::NAN], [3.0, f64::NAN]]);
        let view = m.view();
        let mean = column_profile(&view, AverageType::Mean);
        assert!((mean[0] - 2.0).abs() < 1e-9);
        assert!(mean[1].is_nan());

        let median = column_profile(&view, AverageType::Median);
        assert!((median[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn effective_bounds_fall_back_on_degenerate_panels() {
        let all_nan = arr2(&[[f64::NAN, f64::NAN]]);
        let (lo, hi) = effective_bounds(&all_nan.view(), (None, None));
        assert!(lo.is_finite() && hi > lo);

        let m = arr2(&[[1.0, 5.0]]);
        assert_eq!(effective_bounds(&m.view(), (None, None)), (1.0, 5.0));
        assert_eq!(
            effective_bounds(&m.view(), (Some(-2.0), Some(9.0))),
            (-2.0, 9.0)
        );
    }

    #[test]
    fn missing_cells_use_the_missing_color() {
        let cmap = Colormap::from_name("binary").unwrap();
        let c = cell_color(f64::NAN, 0.0, 1.0, &cmap, (10, 20, 30));
        assert_eq!((c.0, c.1, c.2), (10, 20, 30));
    }

    #[test]
    fn catmull_rom_is_exact_on_linear_ramps() {
        assert!((catmull_rom(0.0, 1.0, 2.0, 3.0, 0.5) - 1.5).abs() < 1e-9);
        assert!((catmull_rom(0.0, 1.0, 2.0, 3.0, 0.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn resampling_preserves_constants() {
        let m = Array2::from_elem((300, 1200), 4.2);
        let out = resample_cubic(&m.view(), 100, 400);
        assert_eq!(out.dim(), (100, 400));
        assert!(out.iter().all(|v| (v - 4.2).abs() < 1e-9));
    }

    #[test]
    fn envelope_pads_the_extrema() {
        let curves = vec![vec![ProfileCurve {
            avg: vec![0.0, 10.0],
            std: vec![0.0, 0.0],
        }]];
        let (lo, hi) = envelope(&curves);
        assert!(lo < 0.0 && hi > 10.0);
    }

    #[test]
    fn envelope_of_empty_curves_is_unit_range() {
        let curves = vec![vec![ProfileCurve {
            avg: vec![f64::NAN],
            std: vec![f64::NAN],
        }]];
        assert_eq!(envelope(&curves), (0.0, 1.0));
    }

    #[test]
    fn tick_format_switches_notation() {
        assert_eq!(format_tick(0.0), "0");
        assert_eq!(format_tick(0.5), "0.50");
        assert_eq!(format_tick(12345.0), "1.2e4");
    }
}
