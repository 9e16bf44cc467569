//! Geometry Normalizer: turns raw vector datasets into valid, canonical-frame
//! hazards and spatial units.

use std::collections::HashSet;

use geo::Centroid;
use serde_json::Value;

use popexp_core::error::{ExposureError, Result};
use popexp_core::models::{Crs, HazardFeature, ProjectedHazard, RawFeature, SpatialUnit, ValidityMode, VectorDataset};

use crate::projection::select_projection;
use crate::transform::Reprojector;
use crate::validation::{apply_validity_mode, is_empty_geometry, repair_geometry, repair_polygonal_geometry};

/// Attribute names and invalid-feature policy used during normalization
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub hazard_id_column: String,
    pub buffer_column: String,
    pub unit_id_column: String,
    pub validity_mode: ValidityMode,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            hazard_id_column: "ID_climate_hazard".to_string(),
            buffer_column: "buffer_dist".to_string(),
            unit_id_column: "ID_spatial_unit".to_string(),
            validity_mode: ValidityMode::Strict,
        }
    }
}

/// Normalize hazards and attach each one's local metric projection
pub fn normalize_hazards(dataset: &VectorDataset, options: &NormalizeOptions) -> Result<Vec<ProjectedHazard>> {
    let features = present_features(dataset)?;

    let mut rows = Vec::with_capacity(features.len());
    for feature in features {
        let id = string_attribute(feature, &options.hazard_id_column)?;
        let buffer_distance = numeric_attribute(feature, &options.buffer_column, &id)?;
        rows.push((id, buffer_distance, feature));
    }
    check_unique(rows.iter().map(|(id, _, _)| id.as_str()), &dataset.name)?;

    let reprojector = Reprojector::new(&dataset.crs, &Crs::wgs84())?;
    let mut hazards = Vec::with_capacity(rows.len());

    for (id, buffer_distance, feature) in rows {
        let Some(geometry) = feature.geometry.clone() else {
            continue;
        };

        let repaired = apply_validity_mode(repair_geometry(geometry), &id, options.validity_mode)?;
        let Some(repaired) = repaired else {
            continue;
        };
        let geometry = reprojector.geometry(&repaired).map_err(|e| e.with_feature_id(&id))?;

        let Some(centroid) = geometry.centroid() else {
            tracing::debug!(feature_id = %id, "Dropping hazard without a representative point");
            continue;
        };

        let projection = apply_validity_mode(
            select_projection(centroid.y(), centroid.x()),
            &id,
            options.validity_mode,
        )?;
        let Some(projection) = projection else {
            continue;
        };

        hazards.push(ProjectedHazard {
            hazard: HazardFeature { id, geometry, buffer_distance },
            centroid_lat: centroid.y(),
            centroid_lon: centroid.x(),
            local_projection: projection.crs(),
        });
    }

    tracing::info!(
        dataset = %dataset.name,
        input = dataset.len(),
        hazards = hazards.len(),
        "Normalized hazard geometries"
    );
    Ok(hazards)
}

/// Normalize polygonal spatial units
pub fn normalize_units(dataset: &VectorDataset, options: &NormalizeOptions) -> Result<Vec<SpatialUnit>> {
    let features = present_features(dataset)?;

    let ids = features
        .iter()
        .map(|feature| string_attribute(feature, &options.unit_id_column))
        .collect::<Result<Vec<_>>>()?;
    check_unique(ids.iter().map(String::as_str), &dataset.name)?;

    let reprojector = Reprojector::new(&dataset.crs, &Crs::wgs84())?;
    let mut units = Vec::with_capacity(features.len());

    for (id, feature) in ids.into_iter().zip(features) {
        let Some(geometry) = feature.geometry.clone() else {
            continue;
        };

        let repaired = apply_validity_mode(repair_polygonal_geometry(geometry), &id, options.validity_mode)?;
        let Some(repaired) = repaired else {
            continue;
        };

        let geometry = reprojector.multi_polygon(&repaired).map_err(|e| e.with_feature_id(&id))?;
        units.push(SpatialUnit { id, geometry });
    }

    tracing::info!(
        dataset = %dataset.name,
        input = dataset.len(),
        units = units.len(),
        "Normalized spatial unit geometries"
    );
    Ok(units)
}

/// Features with a non-empty geometry
fn present_features(dataset: &VectorDataset) -> Result<Vec<&RawFeature>> {
    if dataset.geometry_column.is_none() {
        return Err(ExposureError::MissingGeometryColumn { dataset: dataset.name.clone() });
    }

    let present: Vec<&RawFeature> = dataset
        .features
        .iter()
        .filter(|f| f.geometry.as_ref().is_some_and(|g| !is_empty_geometry(g)))
        .collect();

    let dropped = dataset.len() - present.len();
    if dropped > 0 {
        tracing::warn!(dataset = %dataset.name, dropped, "Dropped features with empty geometry");
    }
    Ok(present)
}

fn row_label(feature: &RawFeature) -> String {
    format!("#{}", feature.index)
}

/// A string identifier; integer values are stringified
fn string_attribute(feature: &RawFeature, column: &str) -> Result<String> {
    let missing = || ExposureError::MissingRequiredAttribute {
        attribute: column.to_string(),
        feature_id: row_label(feature),
    };

    match feature.property(column).ok_or_else(missing)? {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        _ => Err(missing()),
    }
}

fn numeric_attribute(feature: &RawFeature, column: &str, feature_id: &str) -> Result<f64> {
    feature
        .property(column)
        .and_then(Value::as_f64)
        .ok_or_else(|| ExposureError::MissingRequiredAttribute {
            attribute: column.to_string(),
            feature_id: feature_id.to_string(),
        })
}

fn check_unique<'a>(ids: impl Iterator<Item = &'a str>, dataset: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ExposureError::DuplicateIdentifier { id: id.to_string(), dataset: dataset.to_string() });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon, Geometry};
    use serde_json::json;

    fn feature(index: usize, properties: Value, geometry: Option<Geometry<f64>>) -> RawFeature {
        let properties = properties.as_object().cloned().unwrap_or_default();
        RawFeature::new(index, properties, geometry)
    }

    fn square(x: f64, y: f64, size: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x, y: y), (x: x + size, y: y), (x: x + size, y: y + size), (x: x, y: y + size)
        ])
    }

    #[test]
    fn test_hazards_get_local_projection() {
        let dataset = VectorDataset::new(
            "fires",
            Crs::wgs84(),
            vec![
                feature(0, json!({"ID_climate_hazard": "berlin", "buffer_dist": 100}), Some(square(13.0, 52.0, 0.1))),
                feature(1, json!({"ID_climate_hazard": 42, "buffer_dist": 0.5}), Some(Geometry::Point(point!(x: -70.0, y: -33.0)))),
            ],
        );

        let hazards = normalize_hazards(&dataset, &NormalizeOptions::default()).unwrap();

        assert_eq!(hazards.len(), 2);
        assert_eq!(hazards[0].id(), "berlin");
        assert_eq!(hazards[0].local_projection, Crs::epsg(32633));
        assert!((hazards[0].centroid_lon - 13.05).abs() < 1e-9);
        assert_eq!(hazards[1].id(), "42");
        assert_eq!(hazards[1].hazard.buffer_distance, 0.5);
        assert_eq!(hazards[1].local_projection, Crs::epsg(32719));
    }

    #[test]
    fn test_empty_geometries_are_dropped() {
        let dataset = VectorDataset::new(
            "fires",
            Crs::wgs84(),
            vec![
                feature(0, json!({"ID_climate_hazard": "a", "buffer_dist": 1}), None),
                feature(1, json!({"ID_climate_hazard": "b", "buffer_dist": 1}), Some(square(0.0, 0.0, 1.0))),
            ],
        );

        let hazards = normalize_hazards(&dataset, &NormalizeOptions::default()).unwrap();
        assert_eq!(hazards.len(), 1);
        assert_eq!(hazards[0].id(), "b");
    }

    #[test]
    fn test_missing_geometry_column() {
        let mut dataset = VectorDataset::new("fires", Crs::wgs84(), vec![]);
        dataset.geometry_column = None;

        let err = normalize_hazards(&dataset, &NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, ExposureError::MissingGeometryColumn { .. }));
    }

    #[test]
    fn test_missing_attribute() {
        let dataset = VectorDataset::new(
            "fires",
            Crs::wgs84(),
            vec![feature(3, json!({"ID_climate_hazard": "a"}), Some(square(0.0, 0.0, 1.0)))],
        );

        let err = normalize_hazards(&dataset, &NormalizeOptions::default()).unwrap_err();
        match err {
            ExposureError::MissingRequiredAttribute { attribute, feature_id } => {
                assert_eq!(attribute, "buffer_dist");
                assert_eq!(feature_id, "a");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let dataset = VectorDataset::new(
            "tracts",
            Crs::wgs84(),
            vec![
                feature(0, json!({"ID_spatial_unit": "t1"}), Some(square(0.0, 0.0, 1.0))),
                feature(1, json!({"ID_spatial_unit": "t1"}), Some(square(2.0, 0.0, 1.0))),
            ],
        );

        let err = normalize_units(&dataset, &NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, ExposureError::DuplicateIdentifier { ref id, .. } if id == "t1"));
    }

    #[test]
    fn test_units_are_reprojected() {
        let dataset = VectorDataset::new(
            "tracts",
            Crs::epsg(32633),
            vec![feature(0, json!({"ID_spatial_unit": "t1"}), Some(square(500_000.0, 0.0, 1000.0)))],
        );

        let units = normalize_units(&dataset, &NormalizeOptions::default()).unwrap();
        let first = units[0].geometry.0[0].exterior().0[0];
        assert!((first.x - 15.0).abs() < 1e-7);
        assert!(first.y.abs() < 1e-7);
    }

    #[test]
    fn test_unit_outside_projection_domain_is_named() {
        let dataset = VectorDataset::new(
            "tracts",
            Crs::epsg(32633),
            vec![feature(0, json!({"ID_spatial_unit": "t9"}), Some(square(1.0e9, 0.0, 1000.0)))],
        );

        let err = normalize_units(&dataset, &NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, ExposureError::Projection { ref feature_id, .. } if feature_id.as_deref() == Some("t9")));
    }

    #[test]
    fn test_lenient_mode_skips_unrepairable_units() {
        let broken = Geometry::Polygon(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0)]);
        let dataset = VectorDataset::new(
            "tracts",
            Crs::wgs84(),
            vec![
                feature(0, json!({"ID_spatial_unit": "bad"}), Some(broken)),
                feature(1, json!({"ID_spatial_unit": "good"}), Some(square(0.0, 0.0, 1.0))),
            ],
        );

        let strict = normalize_units(&dataset, &NormalizeOptions::default()).unwrap_err();
        assert!(matches!(strict, ExposureError::GeometryRepairFailure { ref feature_id, .. } if feature_id == "bad"));

        let options = NormalizeOptions { validity_mode: ValidityMode::Lenient, ..Default::default() };
        let units = normalize_units(&dataset, &options).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].id, "good");
    }

    #[test]
    fn test_out_of_range_hazard_is_invalid_coordinate() {
        let dataset = VectorDataset::new(
            "fires",
            Crs::wgs84(),
            vec![feature(0, json!({"ID_climate_hazard": "x", "buffer_dist": 1}), Some(Geometry::Point(point!(x: 10.0, y: 95.0))))],
        );

        let err = normalize_hazards(&dataset, &NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, ExposureError::InvalidCoordinate { ref feature_id, .. } if feature_id == "x"));
    }
}
