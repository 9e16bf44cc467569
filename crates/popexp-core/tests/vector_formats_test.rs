//! Integration tests for format detection and vector reading

use popexp_core::formats::{read_vector, VectorFormat};
use popexp_core::models::Crs;
use popexp_core::ExposureError;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_read_vector_dispatches_on_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tracts.json");
    fs::write(
        &path,
        r#"{
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "EPSG:3857"}},
        "features": [
            {"type": "Feature",
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]},
             "properties": {"ID_spatial_unit": 7}}
        ]
    }"#,
    )
    .unwrap();

    let dataset = read_vector(&path).unwrap();

    assert_eq!(dataset.name, "tracts");
    assert_eq!(dataset.crs, Crs::epsg(3857));
    assert_eq!(dataset.features[0].property("ID_spatial_unit").and_then(|v| v.as_i64()), Some(7));
}

#[test]
fn test_read_vector_rejects_unknown_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tracts.shp");
    fs::write(&path, b"\0\0\x27\x0a").unwrap();

    let err = read_vector(&path).unwrap_err();
    assert!(matches!(err, ExposureError::UnsupportedFileFormat { .. }));
    assert!(err.to_string().contains("geojson"));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = VectorFormat::GeoJson.reader().read(std::path::Path::new("/nonexistent/fires.geojson")).unwrap_err();
    assert!(matches!(err, ExposureError::Io(_)));
}
