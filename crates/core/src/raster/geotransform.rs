//! Affine geotransformation for rasters

use serde::{Deserialize, Serialize};

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and geographic coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width
/// y = origin_y + row * pixel_height
/// ```
///
/// Only north-up, unrotated grids are supported; `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, negative for north-up)
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Create a new GeoTransform
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Derive the transform that maps a `cols` x `rows` pixel grid onto
    /// the bounding box `(min_x, min_y, max_x, max_y)`.
    ///
    /// The grid origin is the upper-left corner `(min_x, max_y)`.
    pub fn from_bounds(
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        cols: usize,
        rows: usize,
    ) -> Self {
        Self::new(
            min_x,
            max_y,
            (max_x - min_x) / cols as f64,
            -((max_y - min_y) / rows as f64),
        )
    }

    /// Create from GDAL-style array [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]
    ///
    /// Rotation terms are ignored; fieldchip grids are always north-up.
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            origin_y: coeffs[3],
            pixel_height: coeffs[5],
        }
    }

    /// Convert to GDAL-style array
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            0.0,
            self.origin_y,
            0.0,
            self.pixel_height,
        ]
    }

    /// Convert pixel coordinates to geographic coordinates of the pixel center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        let x = self.origin_x + (col as f64 + 0.5) * self.pixel_width;
        let y = self.origin_y + (row as f64 + 0.5) * self.pixel_height;
        (x, y)
    }

    /// Convert pixel coordinates to geographic coordinates (top-left corner)
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        let x = self.origin_x + col as f64 * self.pixel_width;
        let y = self.origin_y + row as f64 * self.pixel_height;
        (x, y)
    }

    /// Convert geographic coordinates to fractional pixel coordinates.
    ///
    /// Integer values fall on pixel corners; the center of pixel `(0, 0)`
    /// maps to `(0.5, 0.5)`.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let col = (x - self.origin_x) / self.pixel_width;
        let row = (y - self.origin_y) / self.pixel_height;
        (col, row)
    }

    /// Mean of the absolute pixel resolutions in x and y.
    ///
    /// This is the buffering distance used when deriving boundary rings.
    pub fn mean_abs_res(&self) -> f64 {
        (self.pixel_width.abs() + self.pixel_height.abs()) / 2.0
    }

    /// Calculate the bounding box `(min_x, min_y, max_x, max_y)` for a
    /// raster of given dimensions
    pub fn bounds(&self, cols: usize, rows: usize) -> (f64, f64, f64, f64) {
        let (x0, y0) = self.pixel_to_geo_corner(0, 0);
        let (x1, y1) = self.pixel_to_geo_corner(cols, rows);

        (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}
