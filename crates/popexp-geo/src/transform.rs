//! CRS transformation and normalization

use geo::{BoundingRect, Coord, Geometry, MapCoords, MultiPolygon, Rect};
use popexp_core::error::{ExposureError, Result};
use popexp_core::models::Crs;
use proj::Proj;

/// Edge samples used when transforming a rectangle
const RECT_DENSIFY_POINTS: usize = 21;

/// Check if two CRS are the same
pub fn crs_match(crs1: &Crs, crs2: &Crs) -> bool {
    crs1 == crs2
}

/// Coordinate transformation between two CRS. Identity when they match.
///
/// A `Proj` handle is not shareable across threads, so parallel stages build one
/// `Reprojector` per task.
pub struct Reprojector {
    from: Crs,
    to: Crs,
    proj: Option<Proj>,
}

impl Reprojector {
    pub fn new(from: &Crs, to: &Crs) -> Result<Self> {
        let proj = if crs_match(from, to) {
            None
        } else {
            let proj = Proj::new_known_crs(&from.identifier(), &to.identifier(), None).map_err(|e| {
                ExposureError::Projection {
                    from: from.to_string(),
                    to: to.to_string(),
                    reason: format!("Failed to create projection: {}", e),
                    feature_id: None,
                }
            })?;
            Some(proj)
        };

        Ok(Self { from: from.clone(), to: to.clone(), proj })
    }

    pub fn is_identity(&self) -> bool {
        self.proj.is_none()
    }

    pub fn source(&self) -> &Crs {
        &self.from
    }

    pub fn target(&self) -> &Crs {
        &self.to
    }

    pub fn coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let Some(proj) = &self.proj else {
            return Ok(coord);
        };

        let (x, y) = proj.convert((coord.x, coord.y)).map_err(|e| self.error(format!("{}", e)))?;
        if !x.is_finite() || !y.is_finite() {
            return Err(self.error(format!("({}, {}) is outside the projection domain", coord.x, coord.y)));
        }
        Ok(Coord { x, y })
    }

    pub fn geometry(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>> {
        if self.is_identity() {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|c| self.coord(c))
    }

    pub fn multi_polygon(&self, geometry: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        if self.is_identity() {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|c| self.coord(c))
    }

    /// Bounds of `rect` after transformation, sampling each edge so that curved
    /// images of straight edges are enclosed.
    pub fn rect(&self, rect: &Rect<f64>) -> Result<Rect<f64>> {
        if self.is_identity() {
            return Ok(*rect);
        }

        let (min, max) = (rect.min(), rect.max());
        let steps = RECT_DENSIFY_POINTS - 1;
        let mut samples = Vec::with_capacity(RECT_DENSIFY_POINTS * 4);
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let x = min.x + (max.x - min.x) * t;
            let y = min.y + (max.y - min.y) * t;
            samples.push(Coord { x, y: min.y });
            samples.push(Coord { x, y: max.y });
            samples.push(Coord { x: min.x, y });
            samples.push(Coord { x: max.x, y });
        }

        let projected = samples.into_iter().map(|c| self.coord(c)).collect::<Result<Vec<_>>>()?;
        geo::MultiPoint::from(projected)
            .bounding_rect()
            .ok_or_else(|| self.error("empty rectangle".to_string()))
    }

    fn error(&self, reason: String) -> ExposureError {
        ExposureError::Projection {
            from: self.from.to_string(),
            to: self.to.to_string(),
            reason,
            feature_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, point};

    #[test]
    fn test_identity_skips_proj() {
        let reprojector = Reprojector::new(&Crs::wgs84(), &Crs::wgs84()).unwrap();
        assert!(reprojector.is_identity());

        let geometry = Geometry::Point(point!(x: 13.4, y: 52.5));
        assert_eq!(reprojector.geometry(&geometry).unwrap(), geometry);
    }

    #[test]
    fn test_wgs84_to_utm_and_back() {
        let forward = Reprojector::new(&Crs::wgs84(), &Crs::epsg(32633)).unwrap();
        let inverse = Reprojector::new(&Crs::epsg(32633), &Crs::wgs84()).unwrap();

        // Central meridian of zone 33 maps to the false easting
        let utm = forward.coord(coord! { x: 15.0, y: 0.0 }).unwrap();
        assert!((utm.x - 500_000.0).abs() < 1e-6);
        assert!(utm.y.abs() < 1e-6);

        let back = inverse.coord(forward.coord(coord! { x: 13.4, y: 52.5 }).unwrap()).unwrap();
        assert!((back.x - 13.4).abs() < 1e-9);
        assert!((back.y - 52.5).abs() < 1e-9);
    }

    #[test]
    fn test_rect_bounds_contain_corners() {
        let forward = Reprojector::new(&Crs::wgs84(), &Crs::mollweide()).unwrap();
        let rect = Rect::new(coord! { x: 10.0, y: 40.0 }, coord! { x: 20.0, y: 50.0 });
        let bounds = forward.rect(&rect).unwrap();

        for corner in [rect.min(), rect.max(), coord! { x: 10.0, y: 50.0 }, coord! { x: 20.0, y: 40.0 }] {
            let c = forward.coord(corner).unwrap();
            assert!(c.x >= bounds.min().x - 1e-6 && c.x <= bounds.max().x + 1e-6);
            assert!(c.y >= bounds.min().y - 1e-6 && c.y <= bounds.max().y + 1e-6);
        }
    }

    #[test]
    fn test_unknown_crs_is_projection_error() {
        let err = Reprojector::new(&Crs::wgs84(), &Crs::epsg(999_999)).err().unwrap();
        assert!(matches!(err, ExposureError::Projection { .. }));
    }
}
