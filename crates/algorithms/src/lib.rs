//! # Fieldchip Algorithms
//!
//! Chip extraction and label rasterization for segmentation training data.
//!
//! ## Pipeline
//!
//! - **geometry**: target bounding polygon and template grid from a point
//! - **resample**: reprojection of source imagery onto a template grid
//! - **chip**: image chip extraction around catalog targets
//! - **vector**: polygon clipping and signed offsetting
//! - **rasterize**: scanline polygon burning
//! - **label**: three-class field-boundary label rasters

pub mod chip;
pub mod geometry;
pub mod label;
pub mod rasterize;
pub mod resample;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::chip::{extract_chip, ChipConfig};
    pub use crate::geometry::{round_bounds, target_polygon, template_grid};
    pub use crate::label::{rasterize_label, LabelConfig};
    pub use crate::rasterize::rasterize;
    pub use crate::resample::{reproject_match, ResampleMethod};
    pub use crate::vector::{clip_polygon, offset_polygon, ClipRect};
    pub use fieldchip_core::prelude::*;
}
