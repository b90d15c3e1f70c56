//! Target polygons and template grids
//!
//! Pure geometry: builds the square bounding polygon around a catalog
//! point and the raster skeleton that chips and labels are aligned to.

use fieldchip_core::{GeoTransform, Raster, CRS};
use geo_types::{polygon, Polygon};

/// Round a value to a fixed number of decimal places (half away from zero)
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Create the square target polygon of half-width `w` centered at `(x, y)`.
///
/// The box spans `[x-w, x+w] x [y-w, y+w]` in CRS units.
pub fn target_polygon(x: f64, y: f64, w: f64) -> Polygon<f64> {
    polygon![
        (x: x - w, y: y - w),
        (x: x + w, y: y - w),
        (x: x + w, y: y + w),
        (x: x - w, y: y + w),
        (x: x - w, y: y - w),
    ]
}

/// Round a bounding box to `decimals` decimal places.
///
/// Rounding must happen before the template transform is derived;
/// otherwise bounds computed independently for the chip and the template
/// differ by floating-point epsilon and the exact-equality validation
/// in the extraction step fails.
pub fn round_bounds(bounds: (f64, f64, f64, f64), decimals: u32) -> (f64, f64, f64, f64) {
    (
        round_to(bounds.0, decimals),
        round_to(bounds.1, decimals),
        round_to(bounds.2, decimals),
        round_to(bounds.3, decimals),
    )
}

/// Create a zero-filled template grid of `rows` x `cols` pixels mapped
/// onto `bounds`, carrying `crs`.
///
/// The template is the resampling target for chip extraction and the
/// value-bearing frame for label rasterization. Callers pass bounds
/// already rounded via [`round_bounds`].
pub fn template_grid(
    bounds: (f64, f64, f64, f64),
    rows: usize,
    cols: usize,
    crs: CRS,
) -> Raster<u8> {
    let (min_x, min_y, max_x, max_y) = bounds;
    let mut grid: Raster<u8> = Raster::new(rows, cols);
    grid.set_transform(GeoTransform::from_bounds(
        min_x, min_y, max_x, max_y, cols, rows,
    ));
    grid.set_crs(Some(crs));
    grid
}
