//! Per-cell coverage of a polygonal geometry over a raster window.
//!
//! Fractional coverage clips every ring first to a row band, then to each cell of
//! that band, and measures the clipped area. Hole areas are subtracted from the
//! exterior area of the same cell.

use geo::{coord, Coord, Intersects, LineString, MultiPolygon, Rect};
use serde::{Deserialize, Serialize};

use popexp_core::raster::{GeoTransform, PixelWindow};

/// How a cell's weight is derived from the geometry covering it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoverageMode {
    /// Weight is the covered fraction of the cell area
    #[default]
    Fractional,
    /// Any cell the geometry covers or whose boundary it touches has weight 1
    AllTouched,
}

/// Half-plane used by one Sutherland–Hodgman pass
#[derive(Debug, Clone, Copy)]
enum Edge {
    MinX(f64),
    MaxX(f64),
    MinY(f64),
    MaxY(f64),
}

impl Edge {
    fn inside(&self, c: Coord<f64>) -> bool {
        match *self {
            Edge::MinX(v) => c.x >= v,
            Edge::MaxX(v) => c.x <= v,
            Edge::MinY(v) => c.y >= v,
            Edge::MaxY(v) => c.y <= v,
        }
    }

    /// Crossing of segment `a`-`b` with the edge line. Only called when `a` and
    /// `b` lie on different sides, so the denominator is non-zero.
    fn crossing(&self, a: Coord<f64>, b: Coord<f64>) -> Coord<f64> {
        match *self {
            Edge::MinX(v) | Edge::MaxX(v) => {
                let t = (v - a.x) / (b.x - a.x);
                coord! { x: v, y: a.y + t * (b.y - a.y) }
            }
            Edge::MinY(v) | Edge::MaxY(v) => {
                let t = (v - a.y) / (b.y - a.y);
                coord! { x: a.x + t * (b.x - a.x), y: v }
            }
        }
    }
}

/// Clip an open ring against one half-plane
fn clip(ring: &[Coord<f64>], edge: Edge) -> Vec<Coord<f64>> {
    let mut out = Vec::with_capacity(ring.len() + 2);
    let Some(&last) = ring.last() else {
        return out;
    };

    let mut prev = last;
    for &current in ring {
        match (edge.inside(prev), edge.inside(current)) {
            (true, true) => out.push(current),
            (false, true) => {
                out.push(edge.crossing(prev, current));
                out.push(current);
            }
            (true, false) => out.push(edge.crossing(prev, current)),
            (false, false) => {}
        }
        prev = current;
    }
    out
}

/// Unsigned shoelace area of an open ring
fn ring_area(ring: &[Coord<f64>]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (i, a) in ring.iter().enumerate() {
        let b = ring[(i + 1) % ring.len()];
        twice += a.x * b.y - b.x * a.y;
    }
    (twice / 2.0).abs()
}

/// Ring coordinates relative to `origin`, without the closing coordinate
fn local_ring(ring: &LineString<f64>, origin: Coord<f64>) -> Vec<Coord<f64>> {
    let mut coords: Vec<Coord<f64>> = ring.coords().map(|c| *c - origin).collect();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    coords
}

/// Cell weights for `geometry` (raster CRS) over `window`, row-major.
pub fn coverage_weights(
    geometry: &MultiPolygon<f64>,
    transform: &GeoTransform,
    window: PixelWindow,
    mode: CoverageMode,
) -> Vec<f64> {
    let mut areas = vec![0.0; window.len()];
    if window.is_empty() {
        return areas;
    }

    // Work relative to the window corner to keep large projected coordinates precise
    let origin = coord! { x: transform.col_left(window.col_off), y: transform.row_top(window.row_off) };
    let (pw, ph) = (transform.pixel_width, transform.pixel_height);

    for polygon in geometry {
        let rings = std::iter::once((polygon.exterior(), 1.0)).chain(polygon.interiors().iter().map(|r| (r, -1.0)));
        for (ring, sign) in rings {
            accumulate_ring(&local_ring(ring, origin), sign, pw, ph, window, &mut areas);
        }
    }

    let cell_area = transform.cell_area();
    let mut weights: Vec<f64> = areas.iter().map(|a| (a / cell_area).clamp(0.0, 1.0)).collect();

    if mode == CoverageMode::AllTouched {
        mark_touched(geometry, transform, window, &mut weights);
    }
    weights
}

fn accumulate_ring(ring: &[Coord<f64>], sign: f64, pw: f64, ph: f64, window: PixelWindow, areas: &mut [f64]) {
    if ring.len() < 3 {
        return;
    }

    let (min_y, max_y) = ring.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| (lo.min(c.y), hi.max(c.y)));
    // Rows run downwards from y = 0
    let first_row = ((-max_y) / ph).floor().max(0.0) as usize;
    let last_row = (((-min_y) / ph).ceil().max(0.0) as usize).min(window.height);

    for row in first_row..last_row {
        let top = -(row as f64) * ph;
        let band = clip(&clip(ring, Edge::MaxY(top)), Edge::MinY(top - ph));
        if band.len() < 3 {
            continue;
        }

        let (min_x, max_x) = band.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| (lo.min(c.x), hi.max(c.x)));
        let first_col = (min_x / pw).floor().max(0.0) as usize;
        let last_col = ((max_x / pw).ceil().max(0.0) as usize).min(window.width);

        for col in first_col..last_col {
            let left = col as f64 * pw;
            let cell = clip(&clip(&band, Edge::MinX(left)), Edge::MaxX(left + pw));
            let area = ring_area(&cell);
            if area > 0.0 {
                areas[row * window.width + col] += sign * area;
            }
        }
    }
}

fn mark_touched(geometry: &MultiPolygon<f64>, transform: &GeoTransform, window: PixelWindow, weights: &mut [f64]) {
    let rings: Vec<&LineString<f64>> =
        geometry.iter().flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors())).collect();

    for row in 0..window.height {
        for col in 0..window.width {
            let weight = &mut weights[row * window.width + col];
            if *weight > 0.0 {
                *weight = 1.0;
                continue;
            }
            let (min_x, min_y, max_x, max_y) = transform.cell_bounds(window.col_off + col, window.row_off + row);
            let cell = Rect::new(coord! { x: min_x, y: min_y }, coord! { x: max_x, y: max_y });
            if rings.iter().any(|ring| ring.intersects(&cell)) {
                *weight = 1.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn unit_grid() -> GeoTransform {
        // 1x1 cells, top-left corner at (0, 10)
        GeoTransform::new(0.0, 10.0, 1.0, 1.0)
    }

    fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ]])
    }

    fn total(weights: &[f64]) -> f64 {
        weights.iter().sum()
    }

    #[test]
    fn test_aligned_square_covers_whole_cells() {
        let window = PixelWindow::new(0, 0, 10, 10);
        let weights = coverage_weights(&square(2.0, 5.0, 2.0), &unit_grid(), window, CoverageMode::Fractional);

        assert!((total(&weights) - 4.0).abs() < 1e-12);
        // rows 3 and 4 hold y in [5, 7]
        assert_eq!(weights[3 * 10 + 2], 1.0);
        assert_eq!(weights[4 * 10 + 3], 1.0);
        assert_eq!(weights[5 * 10 + 2], 0.0);
    }

    #[test]
    fn test_offset_square_splits_cells() {
        let window = PixelWindow::new(0, 0, 10, 10);
        let weights = coverage_weights(&square(2.5, 5.5, 1.0), &unit_grid(), window, CoverageMode::Fractional);

        assert!((total(&weights) - 1.0).abs() < 1e-12);
        let partial: Vec<f64> = weights.iter().copied().filter(|w| *w > 0.0).collect();
        assert_eq!(partial.len(), 4);
        assert!(partial.iter().all(|w| (w - 0.25).abs() < 1e-12));
    }

    #[test]
    fn test_triangle_halves_cell() {
        let window = PixelWindow::new(0, 0, 10, 10);
        let triangle = MultiPolygon::new(vec![polygon![(x: 0.0, y: 9.0), (x: 1.0, y: 9.0), (x: 0.0, y: 10.0)]]);
        let weights = coverage_weights(&triangle, &unit_grid(), window, CoverageMode::Fractional);
        assert!((weights[0] - 0.5).abs() < 1e-12);
        assert!((total(&weights) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_hole_is_subtracted() {
        let window = PixelWindow::new(0, 0, 10, 10);
        let with_hole = MultiPolygon::new(vec![polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)],
            interiors: [[(x: 1.0, y: 1.0), (x: 3.0, y: 1.0), (x: 3.0, y: 3.0), (x: 1.0, y: 3.0)]],
        )]);
        let weights = coverage_weights(&with_hole, &unit_grid(), window, CoverageMode::Fractional);

        assert!((total(&weights) - 12.0).abs() < 1e-9);
        // cell (1, 1) in map units sits inside the hole: row 8, col 1
        assert_eq!(weights[8 * 10 + 1], 0.0);
    }

    #[test]
    fn test_window_offset_and_clipping() {
        // Window covering cols 5..8 and rows 2..4 only
        let window = PixelWindow::new(5, 2, 3, 2);
        let weights = coverage_weights(&square(4.0, 5.0, 5.0), &unit_grid(), window, CoverageMode::Fractional);

        assert_eq!(weights.len(), 6);
        assert!(weights.iter().all(|w| (w - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_all_touched_counts_partial_cells_fully() {
        let window = PixelWindow::new(0, 0, 10, 10);
        let geometry = square(2.5, 5.5, 1.0);

        let fractional = coverage_weights(&geometry, &unit_grid(), window, CoverageMode::Fractional);
        let touched = coverage_weights(&geometry, &unit_grid(), window, CoverageMode::AllTouched);

        assert!((total(&fractional) - 1.0).abs() < 1e-12);
        assert!(total(&touched) >= 4.0);
        assert!(touched.iter().all(|w| *w == 0.0 || *w == 1.0));
    }

    #[test]
    fn test_empty_geometry_has_no_weight() {
        let window = PixelWindow::new(0, 0, 4, 4);
        let weights = coverage_weights(&MultiPolygon::new(vec![]), &unit_grid(), window, CoverageMode::AllTouched);
        assert_eq!(total(&weights), 0.0);
    }
}
