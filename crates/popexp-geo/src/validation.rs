//! Geometry validation and repair

use geo::{
    Area, Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point,
    Polygon, Validation,
};
use popexp_core::error::{ExposureError, Result, UNKNOWN_FEATURE};
use popexp_core::models::ValidityMode;

/// Apply the invalid-feature policy to the outcome of a per-feature step.
///
/// Feature-scoped errors are tagged with `feature_id`; in lenient mode they are
/// logged and turned into `Ok(None)`. Every other error is returned unchanged.
pub fn apply_validity_mode<T>(result: Result<T>, feature_id: &str, mode: ValidityMode) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_feature_scoped() => {
            let e = e.with_feature_id(feature_id);
            match mode {
                ValidityMode::Strict => Err(e),
                ValidityMode::Lenient => {
                    tracing::warn!(feature_id, error = %e, "Skipping invalid feature");
                    Ok(None)
                }
            }
        }
        Err(e) => Err(e),
    }
}

fn repair_error(reason: impl Into<String>) -> ExposureError {
    ExposureError::GeometryRepairFailure { feature_id: UNKNOWN_FEATURE.to_string(), reason: reason.into() }
}

fn all_finite<'a>(coords: impl IntoIterator<Item = &'a Coord<f64>>) -> bool {
    coords.into_iter().all(|c| c.x.is_finite() && c.y.is_finite())
}

/// Whether a geometry has no coordinates at all
pub fn is_empty_geometry(geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::Point(_) | Geometry::Line(_) | Geometry::Rect(_) | Geometry::Triangle(_) => false,
        Geometry::LineString(ls) => ls.0.is_empty(),
        Geometry::Polygon(p) => p.exterior().0.is_empty(),
        Geometry::MultiPoint(mp) => mp.0.is_empty(),
        Geometry::MultiLineString(mls) => mls.0.iter().all(|ls| ls.0.is_empty()),
        Geometry::MultiPolygon(mp) => mp.0.iter().all(|p| p.exterior().0.is_empty()),
        Geometry::GeometryCollection(gc) => gc.0.iter().all(is_empty_geometry),
    }
}

/// Bring a geometry to a valid, simple form.
///
/// Rect, Triangle and Line become Polygon / LineString; collections are flattened
/// into the multi type of their members; invalid polygonal geometries are rebuilt
/// with a unary union. Fails with [`ExposureError::GeometryRepairFailure`] when the
/// result is empty, non-finite or still invalid.
pub fn repair_geometry(geometry: Geometry<f64>) -> Result<Geometry<f64>> {
    match geometry {
        Geometry::Point(p) => repair_point(p).map(Geometry::Point),
        Geometry::MultiPoint(mp) => {
            if mp.0.is_empty() {
                return Err(repair_error("MultiPoint has no points"));
            }
            let points = mp.0.into_iter().map(repair_point).collect::<Result<Vec<_>>>()?;
            Ok(Geometry::MultiPoint(MultiPoint::new(points)))
        }
        Geometry::Line(line) => repair_line_string(LineString::from(vec![line.start, line.end])).map(Geometry::LineString),
        Geometry::LineString(ls) => repair_line_string(ls).map(Geometry::LineString),
        Geometry::MultiLineString(mls) => {
            if mls.0.is_empty() {
                return Err(repair_error("MultiLineString has no members"));
            }
            let lines = mls.0.into_iter().map(repair_line_string).collect::<Result<Vec<_>>>()?;
            Ok(Geometry::MultiLineString(MultiLineString::new(lines)))
        }
        Geometry::Rect(rect) => repair_polygonal(MultiPolygon::new(vec![rect.to_polygon()])).map(simplify_multi),
        Geometry::Triangle(tri) => repair_polygonal(MultiPolygon::new(vec![tri.to_polygon()])).map(simplify_multi),
        Geometry::Polygon(p) => repair_polygonal(MultiPolygon::new(vec![p])).map(simplify_multi),
        Geometry::MultiPolygon(mp) => repair_polygonal(mp).map(Geometry::MultiPolygon),
        Geometry::GeometryCollection(gc) => repair_collection(gc),
    }
}

/// Repair a polygonal geometry and return it as a multipolygon. Non-polygonal
/// input is a repair failure.
pub fn repair_polygonal_geometry(geometry: Geometry<f64>) -> Result<MultiPolygon<f64>> {
    match repair_geometry(geometry)? {
        Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => Ok(mp),
        other => Err(repair_error(format!("expected a polygonal geometry, found {}", geometry_type(&other)))),
    }
}

/// Multipolygon view of a polygonal geometry, `None` for points and lines
pub fn as_multi_polygon(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Some(MultiPolygon::new(vec![t.to_polygon()])),
        _ => None,
    }
}

pub fn geometry_type(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

fn repair_point(point: Point<f64>) -> Result<Point<f64>> {
    if !point.x().is_finite() || !point.y().is_finite() {
        return Err(repair_error(format!("Point({}, {}) has non-finite coordinates", point.x(), point.y())));
    }
    Ok(point)
}

fn repair_line_string(mut line: LineString<f64>) -> Result<LineString<f64>> {
    if !all_finite(&line.0) {
        return Err(repair_error("LineString has non-finite coordinates"));
    }
    line.0.dedup();
    if line.0.len() < 2 {
        return Err(repair_error(format!("LineString must have at least 2 distinct points, found {}", line.0.len())));
    }
    Ok(line)
}

fn repair_polygonal(geometry: MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
    let finite = geometry
        .0
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
        .all(|ring| all_finite(&ring.0));
    if !finite {
        return Err(repair_error("Polygon has non-finite coordinates"));
    }

    let well_formed = geometry.0.iter().all(|p| {
        p.exterior().0.len() >= 4 && p.interiors().iter().all(|ring| ring.0.len() >= 4)
    });

    if well_formed && !geometry.0.is_empty() && geometry.is_valid() {
        return Ok(geometry);
    }

    // Drop degenerate rings, then let the overlay engine resolve
    // self-intersections, overlapping parts and misplaced holes.
    let cleaned: Vec<Polygon<f64>> = geometry
        .0
        .into_iter()
        .filter(|p| p.exterior().0.len() >= 4)
        .map(|p| {
            let (exterior, interiors) = p.into_inner();
            let interiors = interiors.into_iter().filter(|ring| ring.0.len() >= 4).collect();
            Polygon::new(exterior, interiors)
        })
        .collect();

    if cleaned.is_empty() {
        return Err(repair_error("Polygon has no ring with at least 4 points"));
    }

    let repaired = geo::unary_union(cleaned.iter());
    if repaired.0.is_empty() || repaired.unsigned_area() == 0.0 {
        return Err(repair_error("Polygon collapses to an empty geometry"));
    }
    if !repaired.is_valid() {
        return Err(repair_error("Polygon is still invalid after repair"));
    }

    tracing::debug!(parts = repaired.0.len(), "Repaired invalid polygonal geometry");
    Ok(repaired)
}

fn repair_collection(collection: GeometryCollection<f64>) -> Result<Geometry<f64>> {
    let members = collection
        .0
        .into_iter()
        .filter(|g| !is_empty_geometry(g))
        .map(repair_geometry)
        .collect::<Result<Vec<_>>>()?;

    let mut points = Vec::new();
    let mut lines = Vec::new();
    let mut polygons = Vec::new();
    for member in members {
        match member {
            Geometry::Point(p) => points.push(p),
            Geometry::MultiPoint(mp) => points.extend(mp.0),
            Geometry::LineString(ls) => lines.push(ls),
            Geometry::MultiLineString(mls) => lines.extend(mls.0),
            Geometry::Polygon(p) => polygons.push(p),
            Geometry::MultiPolygon(mp) => polygons.extend(mp.0),
            _ => {}
        }
    }

    match (points.is_empty(), lines.is_empty(), polygons.is_empty()) {
        (true, true, true) => Err(repair_error("GeometryCollection is empty")),
        (true, true, false) => repair_polygonal(MultiPolygon::new(polygons)).map(simplify_multi),
        (true, false, true) => Ok(Geometry::MultiLineString(MultiLineString::new(lines))),
        (false, true, true) => Ok(Geometry::MultiPoint(MultiPoint::new(points))),
        _ => Err(repair_error("GeometryCollection mixes points, lines and polygons")),
    }
}

fn simplify_multi(geometry: MultiPolygon<f64>) -> Geometry<f64> {
    if geometry.0.len() == 1 {
        let mut polygons = geometry.0;
        Geometry::Polygon(polygons.remove(0))
    } else {
        Geometry::MultiPolygon(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon, Rect};

    #[test]
    fn test_valid_polygon_is_unchanged() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)];
        let repaired = repair_geometry(Geometry::Polygon(square.clone())).unwrap();
        assert_eq!(repaired, Geometry::Polygon(square));
    }

    #[test]
    fn test_bowtie_is_repaired() {
        let bowtie = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 2.0), (x: 2.0, y: 0.0), (x: 0.0, y: 2.0)];
        assert!(!bowtie.is_valid());

        let repaired = repair_polygonal_geometry(Geometry::Polygon(bowtie)).unwrap();
        assert!(repaired.is_valid());
        assert!((repaired.unsigned_area() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_overlapping_multipolygon_parts_are_merged() {
        let a = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)];
        let b = polygon![(x: 1.0, y: 0.0), (x: 3.0, y: 0.0), (x: 3.0, y: 2.0), (x: 1.0, y: 2.0)];
        let repaired = repair_polygonal_geometry(Geometry::MultiPolygon(MultiPolygon::new(vec![a, b]))).unwrap();

        assert_eq!(repaired.0.len(), 1);
        assert!((repaired.unsigned_area() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_polygon_fails() {
        let flat = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0)];
        let err = repair_geometry(Geometry::Polygon(flat)).unwrap_err();
        assert!(matches!(err, ExposureError::GeometryRepairFailure { .. }));
    }

    #[test]
    fn test_non_finite_point_fails() {
        assert!(repair_geometry(Geometry::Point(point!(x: f64::NAN, y: 1.0))).is_err());
        assert!(repair_geometry(Geometry::Point(point!(x: 1.0, y: 1.0))).is_ok());
    }

    #[test]
    fn test_rect_becomes_polygon() {
        let rect = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 3.0 });
        let repaired = repair_geometry(Geometry::Rect(rect)).unwrap();
        assert!(matches!(repaired, Geometry::Polygon(_)));
    }

    #[test]
    fn test_collection_of_polygons_is_flattened() {
        let a = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let b = polygon![(x: 5.0, y: 5.0), (x: 6.0, y: 5.0), (x: 6.0, y: 6.0), (x: 5.0, y: 6.0)];
        let gc = GeometryCollection::new_from(vec![Geometry::Polygon(a), Geometry::Polygon(b)]);

        let repaired = repair_geometry(Geometry::GeometryCollection(gc)).unwrap();
        assert!(matches!(repaired, Geometry::MultiPolygon(ref mp) if mp.0.len() == 2));
    }

    #[test]
    fn test_points_are_not_polygonal() {
        let err = repair_polygonal_geometry(Geometry::Point(point!(x: 1.0, y: 1.0))).unwrap_err();
        assert!(err.to_string().contains("Point"));
    }

    #[test]
    fn test_lenient_mode_skips_feature_errors() {
        let failing: Result<()> = Err(repair_error("broken"));
        assert!(apply_validity_mode(failing, "fire-1", ValidityMode::Lenient).unwrap().is_none());

        let failing: Result<()> = Err(repair_error("broken"));
        let err = apply_validity_mode(failing, "fire-1", ValidityMode::Strict).unwrap_err();
        assert!(err.to_string().contains("fire-1"));

        let fatal: Result<()> = Err(ExposureError::ConfigInvalid { key: "raster_crs".to_string(), reason: "bad".to_string() });
        assert!(apply_validity_mode(fatal, "fire-1", ValidityMode::Lenient).is_err());
    }

    #[test]
    fn test_is_empty_geometry() {
        assert!(is_empty_geometry(&Geometry::MultiPolygon(MultiPolygon::new(vec![]))));
        assert!(is_empty_geometry(&Geometry::LineString(LineString::new(vec![]))));
        assert!(!is_empty_geometry(&Geometry::Point(point!(x: 0.0, y: 0.0))));
    }
}
