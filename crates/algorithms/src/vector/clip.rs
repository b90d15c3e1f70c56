//! Polygon clipping against a rectangular extent
//!
//! Sutherland-Hodgman clipping of field polygons to the chip footprint,
//! so that geometry outside the grid never reaches the rasterizer.

use geo_types::{Coord, LineString, Polygon};

/// A clipping rectangle
#[derive(Debug, Clone, Copy)]
pub struct ClipRect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl ClipRect {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Build from a `(min_x, min_y, max_x, max_y)` bounds tuple
    pub fn from_bounds(bounds: (f64, f64, f64, f64)) -> Self {
        Self::new(bounds.0, bounds.1, bounds.2, bounds.3)
    }
}

/// Edge of the clipping rectangle
#[derive(Debug, Clone, Copy)]
enum Edge {
    Left,
    Right,
    Bottom,
    Top,
}

impl Edge {
    fn is_inside(&self, p: &Coord<f64>, rect: &ClipRect) -> bool {
        match self {
            Edge::Left => p.x >= rect.min_x,
            Edge::Right => p.x <= rect.max_x,
            Edge::Bottom => p.y >= rect.min_y,
            Edge::Top => p.y <= rect.max_y,
        }
    }

    fn intersect(&self, p: &Coord<f64>, q: &Coord<f64>, rect: &ClipRect) -> Coord<f64> {
        let dx = q.x - p.x;
        let dy = q.y - p.y;

        match self {
            Edge::Left => {
                let t = (rect.min_x - p.x) / dx;
                Coord {
                    x: rect.min_x,
                    y: p.y + t * dy,
                }
            }
            Edge::Right => {
                let t = (rect.max_x - p.x) / dx;
                Coord {
                    x: rect.max_x,
                    y: p.y + t * dy,
                }
            }
            Edge::Bottom => {
                let t = (rect.min_y - p.y) / dy;
                Coord {
                    x: p.x + t * dx,
                    y: rect.min_y,
                }
            }
            Edge::Top => {
                let t = (rect.max_y - p.y) / dy;
                Coord {
                    x: p.x + t * dx,
                    y: rect.max_y,
                }
            }
        }
    }
}

/// Clip one ring against one edge (Sutherland-Hodgman step)
fn clip_ring_edge(vertices: &[Coord<f64>], edge: Edge, rect: &ClipRect) -> Vec<Coord<f64>> {
    if vertices.is_empty() {
        return Vec::new();
    }

    let mut output = Vec::new();
    let n = vertices.len();

    for i in 0..n {
        let current = &vertices[i];
        let next = &vertices[(i + 1) % n];

        let current_inside = edge.is_inside(current, rect);
        let next_inside = edge.is_inside(next, rect);

        match (current_inside, next_inside) {
            (true, true) => {
                output.push(*next);
            }
            (true, false) => {
                output.push(edge.intersect(current, next, rect));
            }
            (false, true) => {
                output.push(edge.intersect(current, next, rect));
                output.push(*next);
            }
            (false, false) => {}
        }
    }

    output
}

fn clip_ring(ring: &LineString<f64>, rect: &ClipRect) -> Option<LineString<f64>> {
    let mut vertices: Vec<Coord<f64>> = ring.0.to_vec();

    // Remove closing vertex for the algorithm
    if vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }

    for edge in [Edge::Left, Edge::Right, Edge::Bottom, Edge::Top] {
        vertices = clip_ring_edge(&vertices, edge, rect);
        if vertices.is_empty() {
            return None;
        }
    }

    if vertices.len() < 3 {
        return None;
    }

    // Close the ring
    vertices.push(vertices[0]);
    Some(LineString::new(vertices))
}

/// Clip a polygon by a rectangular extent.
///
/// The exterior and every interior ring are clipped independently;
/// interior rings that fall entirely outside the rectangle drop out.
///
/// # Returns
/// The clipped polygon, or `None` if it lies completely outside
pub fn clip_polygon(poly: &Polygon<f64>, rect: ClipRect) -> Option<Polygon<f64>> {
    let exterior = clip_ring(poly.exterior(), &rect)?;

    let interiors: Vec<LineString<f64>> = poly
        .interiors()
        .iter()
        .filter_map(|ring| clip_ring(ring, &rect))
        .collect();

    Some(Polygon::new(exterior, interiors))
}
