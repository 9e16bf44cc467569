//! GeoJSON format reader implementation

use std::fs;
use std::path::Path;

use geojson::GeoJson;

use crate::error::{ExposureError, Result};
use crate::formats::{dataset_name, VectorReader};
use crate::models::{Crs, RawFeature, VectorDataset};

/// GeoJSON format reader
pub struct GeoJsonReader;

impl VectorReader for GeoJsonReader {
    fn read(&self, path: &Path) -> Result<VectorDataset> {
        let content = fs::read_to_string(path)?;

        let geojson: GeoJson = content.parse().map_err(|e| ExposureError::UnsupportedFileFormat {
            path: path.to_path_buf(),
            reason: format!("Failed to parse GeoJSON: {}", e),
        })?;

        let (features, crs) = extract_features_and_crs(geojson, path)?;
        let dataset = VectorDataset::new(dataset_name(path), crs, features);

        tracing::debug!(
            dataset = %dataset.name,
            features = dataset.len(),
            crs = %dataset.crs,
            "Read GeoJSON"
        );
        Ok(dataset)
    }

    fn supported_extensions(&self) -> &[&str] {
        &["geojson", "json"]
    }

    fn format_name(&self) -> &str {
        "GeoJSON"
    }
}

/// Extract features and CRS from GeoJSON
fn extract_features_and_crs(geojson: GeoJson, path: &Path) -> Result<(Vec<RawFeature>, Crs)> {
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            // Legacy "crs" member; RFC 7946 files are always WGS 84
            let crs = fc
                .foreign_members
                .as_ref()
                .and_then(|fm| fm.get("crs"))
                .and_then(extract_crs)
                .unwrap_or_default();

            let features = fc
                .features
                .into_iter()
                .enumerate()
                .map(|(idx, feature)| convert_feature(feature, idx, path))
                .collect::<Result<Vec<_>>>()?;

            Ok((features, crs))
        }
        GeoJson::Feature(feature) => Ok((vec![convert_feature(feature, 0, path)?], Crs::wgs84())),
        GeoJson::Geometry(geometry) => {
            let geometry = convert_geometry(geometry, path)?;
            Ok((vec![RawFeature::new(0, serde_json::Map::new(), Some(geometry))], Crs::wgs84()))
        }
    }
}

/// Convert a GeoJSON feature to a RawFeature
fn convert_feature(feature: geojson::Feature, idx: usize, path: &Path) -> Result<RawFeature> {
    let geometry = feature.geometry.map(|g| convert_geometry(g, path)).transpose()?;
    let properties = feature.properties.unwrap_or_default();
    Ok(RawFeature::new(idx, properties, geometry))
}

fn convert_geometry(geometry: geojson::Geometry, path: &Path) -> Result<geo::Geometry<f64>> {
    geo::Geometry::<f64>::try_from(geometry).map_err(|e| ExposureError::UnsupportedFileFormat {
        path: path.to_path_buf(),
        reason: format!("Unsupported GeoJSON geometry: {}", e),
    })
}

/// Extract the CRS from a legacy `crs` object (`{"type": "name", "properties": {"name": ...}}`)
fn extract_crs(crs: &serde_json::Value) -> Option<Crs> {
    let name = crs.get("properties")?.get("name")?.as_str()?;
    match name.parse::<Crs>() {
        Ok(crs) => Some(crs),
        Err(e) => {
            tracing::warn!(crs = name, error = %e, "Ignoring unrecognised GeoJSON crs member");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_geojson(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("fires.geojson");
        fs::write(&file_path, content).unwrap();
        (temp_dir, file_path)
    }

    #[test]
    fn test_geojson_reader_feature_collection() {
        let (_dir, path) = write_geojson(
            r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [13.4, 52.5]},
                    "properties": {"ID_climate_hazard": "fire-1", "buffer_dist": 250}
                },
                {
                    "type": "Feature",
                    "geometry": null,
                    "properties": {"ID_climate_hazard": "fire-2", "buffer_dist": 0}
                }
            ]
        }"#,
        );

        let dataset = GeoJsonReader.read(&path).unwrap();

        assert_eq!(dataset.name, "fires");
        assert!(dataset.crs.is_wgs84());
        assert_eq!(dataset.len(), 2);
        assert!(matches!(dataset.features[0].geometry, Some(geo::Geometry::Point(_))));
        assert!(dataset.features[1].geometry.is_none());
        assert_eq!(dataset.features[0].property("ID_climate_hazard").unwrap(), "fire-1");
    }

    #[test]
    fn test_geojson_reader_crs_member() {
        let (_dir, path) = write_geojson(
            r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32633"}},
            "features": []
        }"#,
        );

        let dataset = GeoJsonReader.read(&path).unwrap();
        assert_eq!(dataset.crs, Crs::epsg(32633));
    }

    #[test]
    fn test_geojson_reader_single_geometry() {
        let (_dir, path) = write_geojson(
            r#"{"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}"#,
        );

        let dataset = GeoJsonReader.read(&path).unwrap();
        assert_eq!(dataset.len(), 1);
        assert!(dataset.features[0].properties.is_empty());
    }

    #[test]
    fn test_geojson_reader_invalid_json() {
        let (_dir, path) = write_geojson("{ not json");
        let err = GeoJsonReader.read(&path).unwrap_err();
        assert!(matches!(err, ExposureError::UnsupportedFileFormat { .. }));
    }
}
