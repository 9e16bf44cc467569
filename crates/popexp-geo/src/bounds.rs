//! Bounding Window Builder

use geo::{coord, BoundingRect, MultiPolygon, Rect};

/// Axis-aligned bounds of `geometry` grown by `margin` on every side.
/// `None` for an empty geometry.
pub fn bounding_window(geometry: &MultiPolygon<f64>, margin: f64) -> Option<Rect<f64>> {
    geometry.bounding_rect().map(|rect| expand_rect(&rect, margin))
}

pub fn expand_rect(rect: &Rect<f64>, margin: f64) -> Rect<f64> {
    let (min, max) = (rect.min(), rect.max());
    Rect::new(
        coord! { x: min.x - margin, y: min.y - margin },
        coord! { x: max.x + margin, y: max.y + margin },
    )
}

/// Windows for a batch of geometries, in input order
pub fn bounding_windows<'a>(
    geometries: impl IntoIterator<Item = &'a MultiPolygon<f64>>,
    margin: f64,
) -> Vec<Option<Rect<f64>>> {
    geometries.into_iter().map(|g| bounding_window(g, margin)).collect()
}
