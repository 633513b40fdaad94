// src/render/mod.rs
//
// Pure hand-off to the plotting backend: the reconciler guarantees a
// non-empty slice with at least one drawable shape, and nothing here
// repairs or filters data.

use anyhow::{anyhow, Result};
use plotters::prelude::*;
use plotters::style::colors::colormaps::{ColorMap, ViridisRGB};
use std::path::Path;
use tracing::debug;

use crate::reconcile::ReconciledSet;
use crate::table::COL_INCREASE;

const CANVAS: (u32, u32) = (1000, 700);
const LEGEND_WIDTH: u32 = 130;
/// Matplotlib's `'0.8'` gray, the county outline color.
const OUTLINE: RGBColor = RGBColor(204, 204, 204);
const LEGEND_STEPS: usize = 64;

/// Render the year slice as a filled county map with a legend strip.
pub fn choropleth(set: &ReconciledSet, out: &Path) -> Result<()> {
    let (min, max) = set.increase_range();
    let (lon_min, lon_max, lat_min, lat_max) = bounds_of(set)
        .ok_or_else(|| anyhow!("no drawable geometry in the reconciled set"))?;
    debug!(min, max, "rendering choropleth");

    let root = BitMapBackend::new(out, CANVAS).into_drawing_area();
    root.fill(&WHITE)?;
    let (map_area, legend_area) = root.split_horizontally((CANVAS.0 - LEGEND_WIDTH) as i32);

    let mut chart = ChartBuilder::on(&map_area)
        .margin(10)
        .caption(
            format!("Loomulik iive maakondade kaupa, {}", set.year),
            ("sans-serif", 28),
        )
        .build_cartesian_2d(lon_min..lon_max, lat_min..lat_max)?;
    // No mesh, no axes: the map is the whole figure.

    for row in &set.rows {
        let fill = ViridisRGB.get_color(ramp_position(row.increase, min, max));
        for ring in &row.shape.parts {
            if ring.len() < 3 {
                continue;
            }
            chart.draw_series(std::iter::once(Polygon::new(ring.clone(), fill.filled())))?;
            let mut outline = ring.clone();
            outline.push(ring[0]);
            chart.draw_series(LineSeries::new(outline, &OUTLINE))?;
        }
    }

    draw_legend(&legend_area, min, max)?;
    root.present()?;
    Ok(())
}

/// The vertical color strip with value ticks, standing in for a colorbar.
fn draw_legend<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    min: i64,
    max: i64,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    // A flat slice still needs a non-empty axis range.
    let (lo, hi) = if min == max {
        (min as f64 - 1.0, max as f64 + 1.0)
    } else {
        (min as f64, max as f64)
    };

    let mut legend = ChartBuilder::on(area)
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Right, 55)
        .build_cartesian_2d(0.0..1.0_f64, lo..hi)?;

    legend
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .disable_x_axis()
        .y_labels(6)
        .y_desc(COL_INCREASE)
        .draw()?;

    for i in 0..LEGEND_STEPS {
        let t0 = lo + (hi - lo) * i as f64 / LEGEND_STEPS as f64;
        let t1 = lo + (hi - lo) * (i + 1) as f64 / LEGEND_STEPS as f64;
        let color = ViridisRGB.get_color((i as f32 + 0.5) / LEGEND_STEPS as f32);
        legend.draw_series(std::iter::once(Rectangle::new(
            [(0.0, t0), (1.0, t1)],
            color.filled(),
        )))?;
    }

    Ok(())
}

/// Where a value sits on the color ramp. A flat slice maps to mid-ramp so a
/// single-valued year still gets a visible fill.
fn ramp_position(value: i64, min: i64, max: i64) -> f32 {
    if max == min {
        0.5
    } else {
        (value - min) as f32 / (max - min) as f32
    }
}

/// Bounding box over every drawable ring, padded so strokes at the edge
/// survive. `None` only if no row has a usable ring.
fn bounds_of(set: &ReconciledSet) -> Option<(f64, f64, f64, f64)> {
    let mut lon = (f64::INFINITY, f64::NEG_INFINITY);
    let mut lat = (f64::INFINITY, f64::NEG_INFINITY);
    let mut any = false;

    for row in &set.rows {
        for ring in &row.shape.parts {
            if ring.len() < 3 {
                continue;
            }
            for &(x, y) in ring {
                lon = (lon.0.min(x), lon.1.max(x));
                lat = (lat.0.min(y), lat.1.max(y));
                any = true;
            }
        }
    }
    if !any {
        return None;
    }

    let pad_lon = ((lon.1 - lon.0) * 0.02).max(0.01);
    let pad_lat = ((lat.1 - lat.0) * 0.02).max(0.01);
    Some((lon.0 - pad_lon, lon.1 + pad_lon, lat.0 - pad_lat, lat.1 + pad_lat))
}
