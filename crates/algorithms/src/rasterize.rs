//! Scanline polygon rasterization
//!
//! Burns polygon values onto a georeferenced grid. A pixel is burned
//! when its center falls inside the polygon (even-odd rule), matching
//! the convention of the common GIS rasterizers. Later shapes overwrite
//! earlier ones.

use fieldchip_core::{GeoTransform, RasterElement};
use geo_types::{LineString, Polygon};
use ndarray::Array2;

/// Rasterize `(polygon, value)` pairs onto a `rows` x `cols` grid
/// referenced by `transform`. Unburned pixels keep `fill`.
pub fn rasterize<T: RasterElement>(
    shapes: &[(Polygon<f64>, T)],
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    fill: T,
) -> Array2<T> {
    let mut grid = Array2::from_elem((rows, cols), fill);

    for (polygon, value) in shapes {
        burn_polygon(&mut grid, polygon, *value, transform);
    }

    grid
}

fn burn_polygon<T: RasterElement>(
    grid: &mut Array2<T>,
    polygon: &Polygon<f64>,
    value: T,
    transform: &GeoTransform,
) {
    let (rows, cols) = grid.dim();
    let mut crossings: Vec<f64> = Vec::new();

    for row in 0..rows {
        // Scanline through the centers of this pixel row
        let y = transform.origin_y + (row as f64 + 0.5) * transform.pixel_height;

        crossings.clear();
        collect_crossings(polygon.exterior(), y, &mut crossings);
        for ring in polygon.interiors() {
            collect_crossings(ring, y, &mut crossings);
        }
        if crossings.is_empty() {
            continue;
        }
        crossings.sort_by(f64::total_cmp);

        // Even-odd rule: fill between alternate crossing pairs
        for span in crossings.chunks_exact(2) {
            let (x0, x1) = (span[0], span[1]);
            // Columns whose center x lies in [x0, x1)
            let lo = (x0 - transform.origin_x) / transform.pixel_width - 0.5;
            let hi = (x1 - transform.origin_x) / transform.pixel_width - 0.5;

            let start = lo.ceil().max(0.0) as usize;
            let end = (hi.ceil().min(cols as f64)) as usize;
            for col in start..end {
                grid[[row, col]] = value;
            }
        }
    }
}

/// X coordinates where a ring crosses the horizontal line at `y`.
///
/// The half-open edge rule (`p.y <= y < q.y` or the reverse) counts each
/// vertex crossing exactly once.
fn collect_crossings(ring: &LineString<f64>, y: f64, out: &mut Vec<f64>) {
    for edge in ring.0.windows(2) {
        let (p, q) = (edge[0], edge[1]);
        if (p.y <= y) != (q.y <= y) {
            let t = (y - p.y) / (q.y - p.y);
            out.push(p.x + t * (q.x - p.x));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    /// 1-unit pixels, origin top-left at (0, rows)
    fn unit_transform(rows: usize) -> GeoTransform {
        GeoTransform::new(0.0, rows as f64, 1.0, -1.0)
    }

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
    fn test_burn_square() {
        let transform = unit_transform(20);
        let shapes = vec![(square(5.0, 10.0), 1u8)];
        let grid = rasterize(&shapes, &transform, 20, 20, 0);

        // Burned pixel count: centers in [5, 10) on both axes -> 5x5
        let burned: usize = grid.iter().filter(|&&v| v == 1).count();
        assert_eq!(burned, 25);

        // Row 12 has its centers at y = 7.5, inside the square
        assert_eq!(grid[[12, 7]], 1);
        assert_eq!(grid[[12, 4]], 0);
        assert_eq!(grid[[12, 10]], 0);
    }

    #[test]
    fn test_burn_respects_hole() {
        let poly = Polygon::new(
            LineString::from(vec![
                (2.0, 2.0),
                (18.0, 2.0),
                (18.0, 18.0),
                (2.0, 18.0),
                (2.0, 2.0),
            ]),
            vec![LineString::from(vec![
                (8.0, 8.0),
                (12.0, 8.0),
                (12.0, 12.0),
                (8.0, 12.0),
                (8.0, 8.0),
            ])],
        );
        let transform = unit_transform(20);
        let grid = rasterize(&[(poly, 1u8)], &transform, 20, 20, 0);

        // Center of the hole stays unburned
        assert_eq!(grid[[10, 10]], 0);
        // Ring between hole and exterior is burned
        assert_eq!(grid[[10, 5]], 1);
    }

    #[test]
    fn test_burn_clamps_to_grid() {
        let transform = unit_transform(10);
        let shapes = vec![(square(-5.0, 5.0), 1u8)];
        let grid = rasterize(&shapes, &transform, 10, 10, 0);

        // Burned columns are 0..5 on the bottom half, nothing panics
        assert_eq!(grid[[7, 0]], 1);
        assert_eq!(grid[[7, 4]], 1);
        assert_eq!(grid[[7, 5]], 0);
        assert_eq!(grid[[2, 0]], 0);
    }

    #[test]
    fn test_later_shapes_overwrite() {
        let transform = unit_transform(10);
        let shapes = vec![(square(2.0, 8.0), 1u8), (square(4.0, 6.0), 2u8)];
        let grid = rasterize(&shapes, &transform, 10, 10, 0);

        assert_eq!(grid[[5, 5]], 2);
        assert_eq!(grid[[5, 2]], 1);
    }

    #[test]
    fn test_triangle_half_coverage() {
        let tri = polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ];
        let transform = unit_transform(10);
        let grid = rasterize(&[(tri, 1u8)], &transform, 10, 10, 0);

        // Diagonal edge: pixel centers below x + y = 10 are inside
        assert_eq!(grid[[9, 0]], 1);
        assert_eq!(grid[[0, 0]], 0);
        assert_eq!(grid[[9, 9]], 0);
        let burned: usize = grid.iter().filter(|&&v| v == 1).count();
        assert_eq!(burned, 45);
    }
}
