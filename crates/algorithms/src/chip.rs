//! Image chip extraction
//!
//! Cuts a fixed-size chip from a larger source raster around a catalog
//! target, resampled onto the template grid derived from the target
//! point. The chip's bounds and shape are validated against the template
//! exactly; a mismatch signals a resampling or rounding defect upstream
//! and is never masked.

use crate::geometry::{round_bounds, target_polygon, template_grid};
use crate::resample::{reproject_match, ResampleMethod};
use fieldchip_core::io::{read_stack, write_stack};
use fieldchip_core::{CatalogRow, Error, Result, CRS};
use geo::BoundingRect;
use std::path::PathBuf;
use tracing::info;

/// Configuration for chip extraction
#[derive(Debug, Clone)]
pub struct ChipConfig {
    /// Directory holding the source images
    pub src_dir: PathBuf,
    /// Directory to write chips to
    pub dst_dir: PathBuf,
    /// Half-width of the target box in CRS units
    pub w: f64,
    /// Height in pixels of the output chip
    pub rows: usize,
    /// Width in pixels of the output chip
    pub cols: usize,
    /// CRS of the output grid
    pub crs: CRS,
    /// Decimal places the target bounds are rounded to
    pub decimals: u32,
    /// Overwrite chips that already exist on disk
    pub overwrite: bool,
    /// Resampling kernel
    pub resample: ResampleMethod,
}

impl ChipConfig {
    /// Defaults: w = 0.0025 CRS units, EPSG:4326, 4 decimals, cubic
    /// resampling, no overwrite.
    pub fn new(
        src_dir: impl Into<PathBuf>,
        dst_dir: impl Into<PathBuf>,
        rows: usize,
        cols: usize,
    ) -> Self {
        Self {
            src_dir: src_dir.into(),
            dst_dir: dst_dir.into(),
            w: 0.0025,
            rows,
            cols,
            crs: CRS::wgs84(),
            decimals: 4,
            overwrite: false,
            resample: ResampleMethod::Cubic,
        }
    }
}

/// Derive the chip file name from the site name and a truncated date.
///
/// The trailing day component (3 characters) is dropped, so
/// `"site1"` + `"2021-07-15"` gives `site1_2021-07.tif`.
pub fn chip_file_name(name: &str, date: &str) -> String {
    let truncated = &date[..date.len().saturating_sub(3)];
    format!("{name}_{truncated}.tif")
}

/// Extract one image chip around a catalog target and persist it.
///
/// Skips work when the destination exists and overwriting is disabled.
/// Returns the row augmented with the chip file name.
pub fn extract_chip(row: &CatalogRow, cfg: &ChipConfig) -> Result<CatalogRow> {
    let image = chip_file_name(&row.name, &row.date);
    let dst = cfg.dst_dir.join(&image);

    let mut out_row = row.clone();
    out_row.image = Some(image.clone());

    if !cfg.overwrite && dst.exists() {
        info!("{} exists, skipping", image);
        return Ok(out_row);
    }

    let target = target_polygon(row.x, row.y, cfg.w);
    let rect = target
        .bounding_rect()
        .ok_or_else(|| Error::DegenerateGeometry("Target polygon has no extent".into()))?;
    let bounds = round_bounds(
        (rect.min().x, rect.min().y, rect.max().x, rect.max().y),
        cfg.decimals,
    );
    let template = template_grid(bounds, cfg.rows, cfg.cols, cfg.crs.clone());

    let source = read_stack(cfg.src_dir.join(&row.source_image))?;
    let chip = reproject_match(&source, &template, cfg.resample)?;

    // The chip must land on the template grid exactly
    if chip.bounds() != template.bounds() {
        return Err(Error::BoundsMismatch {
            name: image,
            expected: template.bounds(),
            actual: chip.bounds(),
        });
    }
    if chip.shape() != (cfg.rows, cfg.cols) {
        let (ar, ac) = chip.shape();
        return Err(Error::ShapeMismatch {
            name: image,
            er: cfg.rows,
            ec: cfg.cols,
            ar,
            ac,
        });
    }

    write_stack(&chip, &dst)?;
    info!("Created {}", image);

    Ok(out_row)
}
