//! Field-boundary polygons keyed by assignment

use crate::error::{Error, Result};
use geo_types::{Coord, LineString, Polygon};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// One field polygon belonging to a labeling assignment
#[derive(Debug, Clone)]
pub struct FieldPolygon {
    /// Assignment this polygon belongs to
    pub assignment_id: String,
    /// Polygon geometry in the catalog CRS
    pub polygon: Polygon<f64>,
}

/// All field polygons for a labeling campaign.
///
/// Loaded once from a GeoJSON FeatureCollection and shared read-only across
/// batch rows; each row selects its own polygons by `assignment_id`.
#[derive(Debug, Clone, Default)]
pub struct FieldCollection {
    fields: Vec<FieldPolygon>,
}

impl FieldCollection {
    pub fn new(fields: Vec<FieldPolygon>) -> Self {
        Self { fields }
    }

    /// Read a GeoJSON FeatureCollection from a file.
    ///
    /// Every feature must carry an `assignment_id` property. Polygon and
    /// MultiPolygon geometries are accepted; MultiPolygon parts become
    /// separate [`FieldPolygon`] entries.
    pub fn from_geojson_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_geojson_str(&text)
    }

    /// Parse a GeoJSON FeatureCollection from a string
    pub fn from_geojson_str(text: &str) -> Result<Self> {
        let collection: GeoJsonCollection =
            serde_json::from_str(text).map_err(|e| Error::Vector(e.to_string()))?;

        let mut fields = Vec::new();
        for feature in collection.features {
            let assignment_id = feature
                .properties
                .get("assignment_id")
                .map(value_to_string)
                .ok_or_else(|| Error::Vector("Feature missing assignment_id property".into()))?;

            let Some(geometry) = feature.geometry else {
                continue;
            };
            match geometry {
                GeoJsonGeometry::Polygon { coordinates } => {
                    fields.push(FieldPolygon {
                        assignment_id,
                        polygon: rings_to_polygon(&coordinates)?,
                    });
                }
                GeoJsonGeometry::MultiPolygon { coordinates } => {
                    for rings in &coordinates {
                        fields.push(FieldPolygon {
                            assignment_id: assignment_id.clone(),
                            polygon: rings_to_polygon(rings)?,
                        });
                    }
                }
            }
        }

        Ok(Self { fields })
    }

    /// Polygons belonging to one assignment
    pub fn for_assignment(&self, assignment_id: &str) -> Vec<&Polygon<f64>> {
        self.fields
            .iter()
            .filter(|f| f.assignment_id == assignment_id)
            .map(|f| &f.polygon)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldPolygon> {
        self.fields.iter()
    }
}

// GeoJSON deserialization model. Only the geometry types the fields layer
// can contain are accepted; anything else is a format error.

#[derive(Debug, Deserialize)]
struct GeoJsonCollection {
    features: Vec<GeoJsonFeature>,
}

#[derive(Debug, Deserialize)]
struct GeoJsonFeature {
    geometry: Option<GeoJsonGeometry>,
    #[serde(default)]
    properties: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeoJsonGeometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn rings_to_polygon(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>> {
    let exterior = rings
        .first()
        .ok_or_else(|| Error::Vector("Polygon without exterior ring".into()))?;

    let interiors = rings[1..]
        .iter()
        .map(|ring| ring_to_linestring(ring))
        .collect::<Result<Vec<_>>>()?;

    Ok(Polygon::new(ring_to_linestring(exterior)?, interiors))
}

fn ring_to_linestring(ring: &[Vec<f64>]) -> Result<LineString<f64>> {
    let coords = ring
        .iter()
        .map(|position| {
            if position.len() < 2 {
                return Err(Error::Vector("Position with fewer than 2 ordinates".into()));
            }
            Ok(Coord {
                x: position[0],
                y: position[1],
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if coords.len() < 4 {
        return Err(Error::Vector("Ring with fewer than 4 positions".into()));
    }

    Ok(LineString::new(coords))
}
