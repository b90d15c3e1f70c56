//! Signed polygon offsetting
//!
//! Offsets polygon boundaries by a distance using miter joins: positive
//! distances expand the polygon, negative distances shrink it. The label
//! rasterizer derives its boundary rings from a one-pixel offset in each
//! direction.
//!
//! A shrink larger than the polygon's inradius collapses the ring; that
//! is reported as `Error::DegenerateGeometry` so the caller can switch
//! to its fallback labeling path.

use fieldchip_core::{Error, Result};
use geo_types::{Coord, LineString, Polygon};

/// Offset a polygon's boundary by `distance` (in CRS units).
///
/// Positive distances expand, negative shrink. Interior rings move the
/// opposite way in area terms: expanding the polygon shrinks its holes.
/// Holes that vanish under the offset are dropped; a collapsed or
/// inverted exterior ring is an error.
pub fn offset_polygon(poly: &Polygon<f64>, distance: f64) -> Result<Polygon<f64>> {
    // Normalize orientation: exterior counter-clockwise, holes clockwise,
    // so one right-hand offset rule serves every ring.
    let exterior = oriented(poly.exterior(), true);
    let original_area = ring_area(&exterior);
    if original_area <= 0.0 {
        return Err(Error::DegenerateGeometry(
            "Polygon exterior has no area".into(),
        ));
    }

    let offset_exterior = offset_ring(&exterior, distance)?;
    let area = ring_area(&offset_exterior);
    if !area.is_finite() || area <= 0.0 {
        return Err(Error::DegenerateGeometry(format!(
            "Exterior ring collapsed under offset of {distance}"
        )));
    }
    // A shrink that inverts the ring can still leave positive area on
    // bow-tie self-intersections; reject rings that grew while shrinking
    if distance < 0.0 && area >= original_area {
        return Err(Error::DegenerateGeometry(format!(
            "Exterior ring inverted under offset of {distance}"
        )));
    }

    let mut interiors = Vec::new();
    for ring in poly.interiors() {
        let hole = oriented(ring, false);
        match offset_ring(&hole, distance) {
            Ok(offset_hole) => {
                let hole_area = ring_area(&offset_hole);
                // Hole area is negative for clockwise rings; a hole that
                // flipped or vanished is dropped, not an error
                if hole_area.is_finite() && hole_area < 0.0 {
                    interiors.push(offset_hole);
                }
            }
            Err(_) => continue,
        }
    }

    Ok(Polygon::new(offset_exterior, interiors))
}

/// Offset one closed ring to the right of its travel direction.
///
/// For counter-clockwise rings the right side is outward, so positive
/// distances expand. Vertices are displaced to the intersection of the
/// two adjacent offset edges (miter join); near-parallel joins fall back
/// to a plain normal displacement.
fn offset_ring(ring: &LineString<f64>, distance: f64) -> Result<LineString<f64>> {
    let mut vertices: Vec<Coord<f64>> = ring.0.to_vec();
    if vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }
    // Drop repeated consecutive vertices; they produce zero-length edges
    vertices.dedup_by(|a, b| (a.x - b.x).abs() < 1e-12 && (a.y - b.y).abs() < 1e-12);

    let n = vertices.len();
    if n < 3 {
        return Err(Error::DegenerateGeometry(
            "Ring with fewer than 3 distinct vertices".into(),
        ));
    }

    let mut out = Vec::with_capacity(n + 1);
    for i in 0..n {
        let prev = vertices[(i + n - 1) % n];
        let current = vertices[i];
        let next = vertices[(i + 1) % n];

        let n1 = right_normal(prev, current)?;
        let n2 = right_normal(current, next)?;

        // Miter: the intersection of the two offset edges is
        // p + d * (n1 + n2) / (1 + n1.n2)
        let dot = n1.x * n2.x + n1.y * n2.y;
        let denom = 1.0 + dot;
        let displaced = if denom.abs() < 1e-9 {
            // Spike join (edges reverse direction); plain displacement
            Coord {
                x: current.x + distance * n1.x,
                y: current.y + distance * n1.y,
            }
        } else {
            Coord {
                x: current.x + distance * (n1.x + n2.x) / denom,
                y: current.y + distance * (n1.y + n2.y) / denom,
            }
        };

        if !displaced.x.is_finite() || !displaced.y.is_finite() {
            return Err(Error::DegenerateGeometry(
                "Offset produced a non-finite vertex".into(),
            ));
        }
        out.push(displaced);
    }

    out.push(out[0]);
    Ok(LineString::new(out))
}

/// Unit normal pointing to the right of the directed edge `p -> q`
fn right_normal(p: Coord<f64>, q: Coord<f64>) -> Result<Coord<f64>> {
    let dx = q.x - p.x;
    let dy = q.y - p.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-12 {
        return Err(Error::DegenerateGeometry("Zero-length edge".into()));
    }
    Ok(Coord {
        x: dy / len,
        y: -dx / len,
    })
}

/// Signed ring area (shoelace): positive for counter-clockwise rings
fn ring_area(ring: &LineString<f64>) -> f64 {
    let coords = &ring.0;
    if coords.len() < 4 {
        return 0.0;
    }
    let mut sum = 0.0;
    for pair in coords.windows(2) {
        sum += pair[0].x * pair[1].y - pair[1].x * pair[0].y;
    }
    sum / 2.0
}

/// Return the ring with the requested orientation (ccw or clockwise)
fn oriented(ring: &LineString<f64>, ccw: bool) -> LineString<f64> {
    let area = ring_area(ring);
    if (ccw && area < 0.0) || (!ccw && area > 0.0) {
        let mut coords = ring.0.clone();
        coords.reverse();
        LineString::new(coords)
    } else {
        ring.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo_types::polygon;

    fn square(min: f64, max: f64) -> Polygon<f64> {
        polygon![
            (x: min, y: min),
            (x: max, y: min),
            (x: max, y: max),
            (x: min, y: max),
            (x: min, y: min),
        ]
    }

    #[test]
    fn test_expand_square() {
        let out = offset_polygon(&square(10.0, 20.0), 1.0).unwrap();
        let area = ring_area(&oriented(out.exterior(), true));
        // 10x10 square grown by 1 on each side -> 12x12 (miter corners)
        assert_relative_eq!(area, 144.0, epsilon = 1e-9);
    }

    #[test]
    fn test_shrink_square() {
        let out = offset_polygon(&square(10.0, 20.0), -1.0).unwrap();
        let area = ring_area(&oriented(out.exterior(), true));
        assert_relative_eq!(area, 64.0, epsilon = 1e-9);
    }

    #[test]
    fn test_shrink_collapse_is_error() {
        // Shrinking a 10-wide square by 6 inverts it
        let err = offset_polygon(&square(10.0, 20.0), -6.0);
        assert!(matches!(err, Err(Error::DegenerateGeometry(_))));
    }

    #[test]
    fn test_orientation_independent() {
        // A clockwise-wound exterior must behave like its ccw twin
        let cw = polygon![
            (x: 0.0, y: 0.0),
            (x: 0.0, y: 10.0),
            (x: 10.0, y: 10.0),
            (x: 10.0, y: 0.0),
            (x: 0.0, y: 0.0),
        ];
        let out = offset_polygon(&cw, 1.0).unwrap();
        let area = ring_area(&oriented(out.exterior(), true));
        assert_relative_eq!(area, 144.0, epsilon = 1e-9);
    }

    #[test]
    fn test_expand_shrinks_hole() {
        let poly = Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (20.0, 0.0),
                (20.0, 20.0),
                (0.0, 20.0),
                (0.0, 0.0),
            ]),
            vec![LineString::from(vec![
                (8.0, 8.0),
                (12.0, 8.0),
                (12.0, 12.0),
                (8.0, 12.0),
                (8.0, 8.0),
            ])],
        );

        let out = offset_polygon(&poly, 1.0).unwrap();
        assert_eq!(out.interiors().len(), 1);
        let hole_area = ring_area(&oriented(&out.interiors()[0], true));
        // 4x4 hole shrunk by 1 on each side -> 2x2
        assert_relative_eq!(hole_area, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_expand_drops_vanishing_hole() {
        let poly = Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (20.0, 0.0),
                (20.0, 20.0),
                (0.0, 20.0),
                (0.0, 0.0),
            ]),
            vec![LineString::from(vec![
                (9.0, 9.0),
                (10.5, 9.0),
                (10.5, 10.5),
                (9.0, 10.5),
                (9.0, 9.0),
            ])],
        );

        // Growing by 1 swallows the 1.5-wide hole
        let out = offset_polygon(&poly, 1.0).unwrap();
        assert!(out.interiors().is_empty());
    }
}
