//! # Fieldchip Core
//!
//! Core types and I/O for the fieldchip training-data pipeline.
//!
//! This crate provides:
//! - `Raster<T>`: Georeferenced single-band raster grid
//! - `BandStack<T>`: Multi-band raster sharing one grid
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`: Coordinate Reference System handling
//! - `CatalogRow`: One chip/label assignment from the master catalog
//! - `FieldCollection`: Field-boundary polygons keyed by assignment
//! - GeoTIFF I/O for chips and labels

pub mod catalog;
pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use catalog::{CatalogRow, ColumnSpec, GroupPolicy};
pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{BandStack, GeoTransform, Raster, RasterElement};
pub use vector::{FieldCollection, FieldPolygon};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::catalog::{CatalogRow, ColumnSpec, GroupPolicy};
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{BandStack, GeoTransform, Raster, RasterElement};
    pub use crate::vector::{FieldCollection, FieldPolygon};
}
