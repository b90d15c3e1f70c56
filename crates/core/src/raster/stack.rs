//! Multi-band raster sharing one grid

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::Array2;

/// A multi-band raster: one or more equally-shaped 2D bands sharing a
/// single transform and CRS.
///
/// Image chips are `BandStack<f32>`: the band count follows the source
/// image, while the grid follows the template the chip was resampled onto.
#[derive(Debug, Clone)]
pub struct BandStack<T: RasterElement> {
    bands: Vec<Array2<T>>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> BandStack<T> {
    /// Create a stack from band arrays. All bands must share one shape.
    pub fn from_bands(bands: Vec<Array2<T>>) -> Result<Self> {
        let first = bands
            .first()
            .ok_or_else(|| Error::Other("BandStack requires at least one band".into()))?;
        let dim = first.dim();
        for band in &bands {
            if band.dim() != dim {
                return Err(Error::InvalidDimensions {
                    width: band.ncols(),
                    height: band.nrows(),
                });
            }
        }

        Ok(Self {
            bands,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        })
    }

    /// Number of bands
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Spatial dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.bands[0].dim()
    }

    /// Get one band
    pub fn band(&self, index: usize) -> Result<&Array2<T>> {
        self.bands.get(index).ok_or_else(|| {
            Error::Other(format!(
                "Band {} out of range (stack has {})",
                index,
                self.bands.len()
            ))
        })
    }

    /// Iterate over bands
    pub fn bands(&self) -> impl Iterator<Item = &Array2<T>> {
        self.bands.iter()
    }

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let (rows, cols) = self.shape();
        self.transform.bounds(cols, rows)
    }
}
