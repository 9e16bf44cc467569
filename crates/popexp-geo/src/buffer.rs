//! Buffering Engine: grows every hazard by its own distance in its own UTM zone.

use geo::{Buffer, MultiPolygon};
use rayon::prelude::*;

use popexp_core::error::{ExposureError, Result, UNKNOWN_FEATURE};
use popexp_core::models::{BufferedHazard, Crs, ProjectedHazard, ValidityMode};

use crate::transform::Reprojector;
use crate::validation::{apply_validity_mode, as_multi_polygon};

/// Buffer one hazard.
///
/// A zero distance keeps the geometry as-is without reprojection; points and
/// lines then have an empty footprint.
pub fn buffer_hazard(hazard: &ProjectedHazard) -> Result<BufferedHazard> {
    let distance = hazard.hazard.buffer_distance;
    if !distance.is_finite() || distance < 0.0 {
        return Err(ExposureError::InvalidBufferDistance { feature_id: UNKNOWN_FEATURE.to_string(), distance });
    }

    let footprint = if distance == 0.0 {
        as_multi_polygon(&hazard.hazard.geometry).unwrap_or_else(|| MultiPolygon::new(vec![]))
    } else {
        buffer_in_local_frame(hazard, distance).map_err(|e| e.with_feature_id(hazard.id()))?
    };

    Ok(BufferedHazard { hazard: hazard.clone(), footprint })
}

fn buffer_in_local_frame(hazard: &ProjectedHazard, distance: f64) -> Result<MultiPolygon<f64>> {
    let to_local = Reprojector::new(&Crs::wgs84(), &hazard.local_projection)?;
    let to_canonical = Reprojector::new(&hazard.local_projection, &Crs::wgs84())?;

    let local = to_local.geometry(&hazard.hazard.geometry)?;
    let buffered = local.buffer(distance);
    to_canonical.multi_polygon(&buffered)
}

/// Buffer all hazards in parallel, keeping input order.
///
/// `on_buffered` is called once per hazard as it completes, from worker threads.
pub fn buffer_hazards<F>(hazards: &[ProjectedHazard], mode: ValidityMode, on_buffered: F) -> Result<Vec<BufferedHazard>>
where
    F: Fn() + Sync + Send,
{
    let results: Vec<Result<BufferedHazard>> = hazards
        .par_iter()
        .map(|hazard| {
            let result = buffer_hazard(hazard);
            on_buffered();
            result
        })
        .collect();

    let mut buffered = Vec::with_capacity(results.len());
    for (hazard, result) in hazards.iter().zip(results) {
        if let Some(b) = apply_validity_mode(result, hazard.id(), mode)? {
            buffered.push(b);
        }
    }

    tracing::info!(hazards = hazards.len(), buffered = buffered.len(), "Buffered hazard geometries");
    Ok(buffered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon, Area, Contains, Geometry};
    use popexp_core::models::HazardFeature;

    fn projected(id: &str, geometry: Geometry<f64>, buffer_distance: f64) -> ProjectedHazard {
        ProjectedHazard {
            hazard: HazardFeature { id: id.to_string(), geometry, buffer_distance },
            centroid_lat: 52.5,
            centroid_lon: 13.4,
            local_projection: Crs::epsg(32633),
        }
    }

    fn berlin_square() -> geo::Polygon<f64> {
        polygon![(x: 13.40, y: 52.50), (x: 13.41, y: 52.50), (x: 13.41, y: 52.51), (x: 13.40, y: 52.51)]
    }

    #[test]
    fn test_zero_distance_keeps_geometry() {
        let hazard = projected("a", Geometry::Polygon(berlin_square()), 0.0);
        let buffered = buffer_hazard(&hazard).unwrap();
        assert_eq!(buffered.footprint, MultiPolygon::new(vec![berlin_square()]));
    }

    #[test]
    fn test_zero_distance_point_has_empty_footprint() {
        let hazard = projected("p", Geometry::Point(point!(x: 13.4, y: 52.5)), 0.0);
        let buffered = buffer_hazard(&hazard).unwrap();
        assert!(buffered.footprint.0.is_empty());
    }

    #[test]
    fn test_positive_distance_grows_and_contains() {
        let hazard = projected("a", Geometry::Polygon(berlin_square()), 250.0);
        let buffered = buffer_hazard(&hazard).unwrap();

        assert!(buffered.footprint.unsigned_area() > berlin_square().unsigned_area());
        assert!(buffered.footprint.contains(&berlin_square()));
    }

    #[test]
    fn test_point_buffer_is_metric_circle() {
        let hazard = projected("p", Geometry::Point(point!(x: 13.4, y: 52.5)), 100.0);
        let buffered = buffer_hazard(&hazard).unwrap();

        let to_utm = Reprojector::new(&Crs::wgs84(), &Crs::epsg(32633)).unwrap();
        let area = to_utm.multi_polygon(&buffered.footprint).unwrap().unsigned_area();
        let expected = std::f64::consts::PI * 100.0 * 100.0;
        assert!((area - expected).abs() / expected < 0.02, "area {area}");
    }

    #[test]
    fn test_negative_distance_rejected() {
        let hazard = projected("a", Geometry::Polygon(berlin_square()), -5.0);
        let err = buffer_hazards(&[hazard.clone()], ValidityMode::Strict, || {}).unwrap_err();
        assert!(matches!(err, ExposureError::InvalidBufferDistance { ref feature_id, .. } if feature_id == "a"));

        let lenient = buffer_hazards(&[hazard], ValidityMode::Lenient, || {}).unwrap();
        assert!(lenient.is_empty());
    }

    #[test]
    fn test_projection_failure_names_hazard() {
        let hazard = projected("quake-9", Geometry::Point(point!(x: 13.4, y: 95.0)), 100.0);

        let err = buffer_hazards(&[hazard], ValidityMode::Lenient, || {}).unwrap_err();
        assert!(matches!(err, ExposureError::Projection { ref feature_id, .. } if feature_id.as_deref() == Some("quake-9")));
        assert!(err.to_string().contains("quake-9"));
    }

    #[test]
    fn test_order_is_preserved() {
        let hazards: Vec<_> = (0..20)
            .map(|i| projected(&format!("h{i}"), Geometry::Point(point!(x: 13.4 + i as f64 * 0.01, y: 52.5)), 10.0))
            .collect();
        let counter = std::sync::atomic::AtomicUsize::new(0);

        let buffered = buffer_hazards(&hazards, ValidityMode::Strict, || {
            counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        })
        .unwrap();

        assert_eq!(counter.into_inner(), 20);
        let ids: Vec<&str> = buffered.iter().map(|b| b.id()).collect();
        let expected: Vec<String> = (0..20).map(|i| format!("h{i}")).collect();
        assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }
}
