//! Three-class field-boundary labels
//!
//! Produces, for each catalog assignment, a label raster on the exact
//! grid of the assignment's image chip: 0 = background, 1 = field
//! interior, 2 = field boundary. Boundaries are derived by rasterizing
//! the polygons together with a one-pixel inward and outward offset and
//! composing the three layers.

use crate::rasterize::rasterize;
use crate::vector::{clip_polygon, offset_polygon, ClipRect};
use fieldchip_core::io::{read_stack, write_label};
use fieldchip_core::{BandStack, CatalogRow, Error, FieldCollection, Raster, Result};
use geo_types::Polygon;
use ndarray::Array2;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Configuration for label rasterization
#[derive(Debug, Clone)]
pub struct LabelConfig {
    /// Directory containing image chips
    pub chip_dir: PathBuf,
    /// Directory to write rasterized labels to
    pub label_dir: PathBuf,
    /// Overwrite labels that already exist on disk
    pub overwrite: bool,
}

impl LabelConfig {
    pub fn new(chip_dir: impl Into<PathBuf>, label_dir: impl Into<PathBuf>) -> Self {
        Self {
            chip_dir: chip_dir.into(),
            label_dir: label_dir.into(),
            overwrite: false,
        }
    }
}

/// Derive the label file name by splicing the assignment id into the
/// chip file name at its first underscore.
///
/// `site1_2021-07.tif` with assignment `A12` becomes
/// `site1_A12_2021-07.tif`, so labels and chips stay name-correlated
/// but distinct.
pub fn label_file_name(chip_name: &str, assignment_id: &str) -> Result<String> {
    let mut parts = chip_name.splitn(2, '_');
    let (Some(head), Some(tail)) = (parts.next(), parts.next()) else {
        return Err(Error::Other(format!(
            "Chip name {chip_name} has no underscore to splice the assignment into"
        )));
    };
    Ok(format!("{head}_{assignment_id}_{tail}"))
}

/// Create a three-class label aligned to the assignment's image chip.
///
/// Opens the chip named by the row's `image` field, rasterizes the
/// assignment's field polygons onto the chip grid, and writes the label
/// raster. Returns the row augmented with the label file name.
///
/// The label grid is validated against the chip grid; any bounds or
/// shape mismatch is a fatal error for this row.
pub fn rasterize_label(
    row: &CatalogRow,
    cfg: &LabelConfig,
    fields: &FieldCollection,
) -> Result<CatalogRow> {
    let chip_name = row
        .image
        .as_deref()
        .ok_or_else(|| Error::MissingColumn("image".to_string()))?;
    let lbl_name = label_file_name(chip_name, &row.assignment_id)?;
    let dst = cfg.label_dir.join(&lbl_name);

    let mut out_row = row.clone();
    out_row.label = Some(lbl_name.clone());

    if !cfg.overwrite && dst.exists() {
        info!("{} exists, skipping", lbl_name);
        return Ok(out_row);
    }

    let chip = read_stack(cfg.chip_dir.join(chip_name))?;
    let (rows, cols) = chip.shape();
    let transform = *chip.transform();
    let res = transform.mean_abs_res();

    let label_data = if row.nflds > 0 {
        let polygons = fields.for_assignment(&row.assignment_id);
        debug!(
            "{}: rasterizing {} polygons at res {:.6}",
            lbl_name,
            polygons.len(),
            res
        );
        burn_three_class(&polygons, &chip, res)?
    } else {
        Array2::zeros((rows, cols))
    };

    let mut label: Raster<u8> = Raster::from_vec(label_data.into_raw_vec_and_offset().0, rows, cols)?;
    label.set_transform(transform);
    label.set_crs(chip.crs().cloned());

    // The label must sit on the chip grid exactly; a mismatch signals a
    // geometry defect and must surface rather than be corrected
    if label.bounds() != chip.bounds() {
        return Err(Error::BoundsMismatch {
            name: lbl_name,
            expected: chip.bounds(),
            actual: label.bounds(),
        });
    }
    if label.shape() != (rows, cols) {
        let (ar, ac) = label.shape();
        return Err(Error::ShapeMismatch {
            name: lbl_name,
            er: rows,
            ec: cols,
            ar,
            ac,
        });
    }

    write_label(&label, &dst)?;
    info!("Created {}", lbl_name);

    Ok(out_row)
}

/// Rasterize the three layers and compose them into classes.
///
/// Layers, each burned with value 1 on the chip grid:
/// - `burned`: the polygons clipped to the chip footprint
/// - `shrunk`: each polygon offset inward by `res`
/// - `exploded`: each polygon offset outward by `res`
///
/// When any offset degenerates, the composition falls back to the
/// inward-only form (see [`compose_fallback`]).
fn burn_three_class(
    polygons: &[&Polygon<f64>],
    chip: &BandStack<f32>,
    res: f64,
) -> Result<Array2<u8>> {
    let (rows, cols) = chip.shape();
    let transform = chip.transform();
    let rect = ClipRect::from_bounds(chip.bounds());

    // Keep only polygons that intersect the chip; buffers derive from the
    // unclipped geometry, the grid itself clips them during burning
    let mut clipped: Vec<(Polygon<f64>, i16)> = Vec::new();
    let mut originals: Vec<&Polygon<f64>> = Vec::new();
    for polygon in polygons {
        if let Some(part) = clip_polygon(polygon, rect) {
            clipped.push((part, 1));
            originals.push(polygon);
        }
    }

    let burned = rasterize(&clipped, transform, rows, cols, 0i16);

    let buffers: Result<Vec<(Polygon<f64>, Polygon<f64>)>> = originals
        .iter()
        .map(|polygon| {
            let inward = offset_polygon(polygon, -res)?;
            let outward = offset_polygon(polygon, res)?;
            Ok((inward, outward))
        })
        .collect();

    match buffers {
        Ok(buffers) => {
            let shrunk_shapes: Vec<(Polygon<f64>, i16)> =
                buffers.iter().map(|(inward, _)| (inward.clone(), 1)).collect();
            let exploded_shapes: Vec<(Polygon<f64>, i16)> =
                buffers.iter().map(|(_, outward)| (outward.clone(), 1)).collect();

            let shrunk = rasterize(&shrunk_shapes, transform, rows, cols, 0i16);
            let exploded = rasterize(&exploded_shapes, transform, rows, cols, 0i16);
            Ok(compose(&burned, &shrunk, &exploded))
        }
        Err(err) => {
            // Degenerate offset: drop the outward layer and recompute the
            // inward one per polygon, skipping the ones that still fail
            // (their full extent labels as boundary)
            warn!("Buffer failed ({}), falling back to inward-only labeling", err);
            let shrunk_shapes: Vec<(Polygon<f64>, i16)> = originals
                .iter()
                .filter_map(|polygon| offset_polygon(polygon, -res).ok())
                .map(|inward| (inward, 1))
                .collect();
            let shrunk = rasterize(&shrunk_shapes, transform, rows, cols, 0i16);
            Ok(compose_fallback(&burned, &shrunk))
        }
    }
}

/// Compose the three burned layers into classes {0, 1, 2}.
///
/// `label = burned*2 - shrunk + adjust(exploded*2 - burned)` where
/// `adjust(v)` zeroes the value 1. The first term yields 2 across each
/// polygon and subtracts 1 over its shrunken core; the adjusted outward
/// term extends class 2 into the one-pixel ring outside the polygon
/// while suppressing the spurious 1s the outward layer alone would add.
fn compose(burned: &Array2<i16>, shrunk: &Array2<i16>, exploded: &Array2<i16>) -> Array2<u8> {
    let mut out = Array2::zeros(burned.dim());
    for ((cell, (&b, &s)), &e) in out
        .iter_mut()
        .zip(burned.iter().zip(shrunk.iter()))
        .zip(exploded.iter())
    {
        let outer = e * 2 - b;
        let adjusted = if outer == 1 { 0 } else { outer };
        *cell = (b * 2 - s + adjusted).clamp(0, 2) as u8;
    }
    out
}

/// Inward-only fallback composition: `clamp(burned*2 - shrunk, 0, 2)`.
///
/// Cores keep class 1 and the inside half of each edge gets class 2; the
/// outside ring the exploded layer would contribute is absent in this
/// path.
fn compose_fallback(burned: &Array2<i16>, shrunk: &Array2<i16>) -> Array2<u8> {
    let mut out = Array2::zeros(burned.dim());
    for (cell, (&b, &s)) in out.iter_mut().zip(burned.iter().zip(shrunk.iter())) {
        *cell = (b * 2 - s).clamp(0, 2) as u8;
    }
    out
}
