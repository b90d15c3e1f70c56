//! Catalog rows and catalog filtering
//!
//! The master catalog is a JSON array of assignment records. Each record
//! drives one chip extraction and one label rasterization; quality-metric
//! keys ride along in `extra` and feed the filtering policies.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// One assignment from the label catalog.
///
/// Consumed read-only by the pipeline stages, which return an augmented
/// copy carrying the derived `image` or `label` file name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRow {
    /// Site identifier
    pub name: String,
    /// Centroid longitude (or easting) in the catalog CRS
    pub x: f64,
    /// Centroid latitude (or northing) in the catalog CRS
    pub y: f64,
    /// Acquisition date string
    pub date: String,
    /// Links the row to its field polygons
    pub assignment_id: String,
    /// Source image file name within the source directory
    pub source_image: String,
    /// Number of field polygons for this assignment
    pub nflds: u32,
    /// Quality class, used only by catalog filtering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Chip file name, set by the chip extraction stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Label file name, set by the label rasterization stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Pass-through metadata (quality metrics and any extra columns),
    /// kept flat so written catalogs can be reloaded
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CatalogRow {
    /// Look up a numeric quality metric from the pass-through metadata
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.extra.get(key).and_then(Value::as_f64)
    }
}

/// Maps configurable catalog column names onto [`CatalogRow`] fields.
///
/// The date and source-image columns vary between catalogs; everything
/// else is fixed by convention.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    /// Column holding the acquisition date
    pub date_col: String,
    /// Column holding the source image name
    pub src_col: String,
}

impl Default for ColumnSpec {
    fn default() -> Self {
        Self {
            date_col: "date".to_string(),
            src_col: "source_image".to_string(),
        }
    }
}

/// Read a catalog from a JSON array file
pub fn load_catalog(path: impl AsRef<Path>, columns: &ColumnSpec) -> Result<Vec<CatalogRow>> {
    let text = fs::read_to_string(path.as_ref())?;
    parse_catalog(&text, columns)
}

/// Parse a catalog from a JSON array string
pub fn parse_catalog(text: &str, columns: &ColumnSpec) -> Result<Vec<CatalogRow>> {
    let records: Vec<Map<String, Value>> =
        serde_json::from_str(text).map_err(|e| Error::Catalog(e.to_string()))?;

    records
        .into_iter()
        .map(|record| record_to_row(record, columns))
        .collect()
}

/// Serialize rows back to a JSON catalog file
pub fn write_catalog(rows: &[CatalogRow], path: impl AsRef<Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(rows).map_err(|e| Error::Catalog(e.to_string()))?;
    fs::write(path.as_ref(), text)?;
    Ok(())
}

fn record_to_row(mut record: Map<String, Value>, columns: &ColumnSpec) -> Result<CatalogRow> {
    let name = take_string(&mut record, "name")?;
    let x = take_f64(&mut record, "x")?;
    let y = take_f64(&mut record, "y")?;
    let date = take_string(&mut record, &columns.date_col)?;
    let assignment_id = take_string(&mut record, "assignment_id")?;
    let source_image = take_string(&mut record, &columns.src_col)?;
    let nflds = take_f64(&mut record, "nflds")? as u32;

    let class = record
        .remove("class")
        .or_else(|| record.remove("Class"))
        .map(|v| coerce_string(&v));
    let image = record.remove("image").map(|v| coerce_string(&v));
    let label = record.remove("label").map(|v| coerce_string(&v));

    Ok(CatalogRow {
        name,
        x,
        y,
        date,
        assignment_id,
        source_image,
        nflds,
        class,
        image,
        label,
        extra: record.into_iter().collect(),
    })
}

fn take_string(record: &mut Map<String, Value>, key: &str) -> Result<String> {
    record
        .remove(key)
        .map(|v| coerce_string(&v))
        .ok_or_else(|| Error::MissingColumn(key.to_string()))
}

fn take_f64(record: &mut Map<String, Value>, key: &str) -> Result<f64> {
    record
        .remove(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| Error::MissingColumn(key.to_string()))
}

fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// How to select assignments from one set of quality classes
#[derive(Debug, Clone)]
pub enum GroupPolicy {
    /// Keep every assignment in the listed classes
    Whole(Vec<String>),
    /// Keep, per site name, the assignment with the highest quality metric
    Best(Vec<String>),
}

/// Filter the full catalog by class and quality metric.
///
/// For each policy group, rows whose `class` matches are selected; `Whole`
/// groups pass all of them through, while `Best` groups keep only the
/// highest-`metric` row per site name (sites where no row carries a finite
/// metric keep all their rows). Group results are concatenated in policy
/// order, so the output may contain duplicates when groups overlap.
pub fn filter_catalog(
    catalog: &[CatalogRow],
    groups: &[GroupPolicy],
    metric: &str,
) -> Vec<CatalogRow> {
    let mut out = Vec::new();

    for group in groups {
        match group {
            GroupPolicy::Whole(classes) => {
                info!("Extracting all of class {}", classes.join(" and "));
                out.extend(
                    catalog
                        .iter()
                        .filter(|row| row_in_classes(row, classes))
                        .cloned(),
                );
            }
            GroupPolicy::Best(classes) => {
                info!("Extracting best of class {}", classes.join(" and "));
                let mut by_name: BTreeMap<&str, Vec<&CatalogRow>> = BTreeMap::new();
                for row in catalog.iter().filter(|row| row_in_classes(row, classes)) {
                    by_name.entry(row.name.as_str()).or_default().push(row);
                }

                for rows in by_name.values() {
                    let best = rows
                        .iter()
                        .filter(|r| r.metric(metric).is_some_and(f64::is_finite))
                        .max_by(|a, b| {
                            let ma = a.metric(metric).unwrap_or(f64::NEG_INFINITY);
                            let mb = b.metric(metric).unwrap_or(f64::NEG_INFINITY);
                            ma.total_cmp(&mb)
                        });
                    match best {
                        Some(row) => out.push((*row).clone()),
                        // No usable metric in this group: keep all rows
                        None => out.extend(rows.iter().map(|r| (*r).clone())),
                    }
                }
            }
        }
    }

    out
}

fn row_in_classes(row: &CatalogRow, classes: &[String]) -> bool {
    row.class
        .as_ref()
        .is_some_and(|c| classes.iter().any(|want| want == c))
}
