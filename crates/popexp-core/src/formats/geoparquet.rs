//! GeoParquet format reader implementation
//!
//! Geometry is read from the WKB-encoded primary column named in the `geo` file
//! metadata; all scalar columns become feature properties.

use std::fs::File;
use std::path::Path;

use arrow_array::{
    Array, BinaryArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, LargeBinaryArray,
    LargeStringArray, RecordBatch, StringArray,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::{Map, Value};

use crate::error::{ExposureError, Result};
use crate::formats::{dataset_name, wkb, VectorReader};
use crate::models::{Crs, CrsAuthority, RawFeature, VectorDataset};

const DEFAULT_GEOMETRY_COLUMN: &str = "geometry";

/// GeoParquet format reader
pub struct GeoParquetReader;

impl VectorReader for GeoParquetReader {
    fn read(&self, path: &Path) -> Result<VectorDataset> {
        let unsupported = |reason: String| ExposureError::UnsupportedFileFormat { path: path.to_path_buf(), reason };

        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| unsupported(format!("Failed to open Parquet file: {}", e)))?;

        let geo_metadata = builder
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .and_then(|kv| kv.iter().find(|entry| entry.key == "geo"))
            .and_then(|entry| entry.value.as_deref())
            .map(serde_json::from_str::<Value>)
            .transpose()
            .map_err(|e| unsupported(format!("Invalid 'geo' metadata: {}", e)))?;

        let geometry_column = geo_metadata
            .as_ref()
            .and_then(|geo| geo.get("primary_column"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_GEOMETRY_COLUMN)
            .to_string();

        let crs = geo_metadata
            .as_ref()
            .and_then(|geo| geo.get("columns"))
            .and_then(|columns| columns.get(&geometry_column))
            .and_then(|column| column.get("crs"))
            .and_then(crs_from_projjson)
            .unwrap_or_default();

        let has_geometry = builder.schema().fields().iter().any(|f| f.name() == &geometry_column);

        let reader = builder
            .build()
            .map_err(|e| unsupported(format!("Failed to read Parquet file: {}", e)))?;

        let mut features = Vec::new();
        for batch in reader {
            let batch = batch.map_err(|e| unsupported(format!("Failed to decode record batch: {}", e)))?;
            read_batch(&batch, &geometry_column, &mut features).map_err(unsupported)?;
        }

        let mut dataset = VectorDataset::new(dataset_name(path), crs, features);
        dataset.geometry_column = has_geometry.then_some(geometry_column);

        tracing::debug!(
            dataset = %dataset.name,
            features = dataset.len(),
            crs = %dataset.crs,
            "Read GeoParquet"
        );
        Ok(dataset)
    }

    fn supported_extensions(&self) -> &[&str] {
        &["parquet", "geoparquet"]
    }

    fn format_name(&self) -> &str {
        "GeoParquet"
    }
}

fn read_batch(
    batch: &RecordBatch,
    geometry_column: &str,
    features: &mut Vec<RawFeature>,
) -> std::result::Result<(), String> {
    let schema = batch.schema();
    let offset = features.len();

    let mut rows: Vec<(Map<String, Value>, Option<geo::Geometry<f64>>)> =
        (0..batch.num_rows()).map(|_| (Map::new(), None)).collect();

    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        if field.name() == geometry_column {
            for (row, slot) in rows.iter_mut().enumerate() {
                if let Some(bytes) = binary_value(column.as_ref(), row) {
                    let geometry = wkb::geometry_from_wkb(bytes)
                        .map_err(|e| format!("row {}: invalid WKB geometry: {}", offset + row, e))?;
                    slot.1 = Some(geometry);
                }
            }
            continue;
        }

        for (row, slot) in rows.iter_mut().enumerate() {
            if let Some(value) = scalar_value(column.as_ref(), row) {
                slot.0.insert(field.name().clone(), value);
            }
        }
    }

    features.extend(
        rows.into_iter()
            .enumerate()
            .map(|(row, (properties, geometry))| RawFeature::new(offset + row, properties, geometry)),
    );
    Ok(())
}

fn binary_value(column: &dyn Array, row: usize) -> Option<&[u8]> {
    if column.is_null(row) {
        return None;
    }
    let any = column.as_any();
    if let Some(array) = any.downcast_ref::<BinaryArray>() {
        return Some(array.value(row));
    }
    any.downcast_ref::<LargeBinaryArray>().map(|array| array.value(row))
}

/// JSON value of a scalar cell; `None` for nulls and unsupported column types
fn scalar_value(column: &dyn Array, row: usize) -> Option<Value> {
    if column.is_null(row) {
        return None;
    }
    let any = column.as_any();
    if let Some(array) = any.downcast_ref::<StringArray>() {
        return Some(Value::from(array.value(row)));
    }
    if let Some(array) = any.downcast_ref::<LargeStringArray>() {
        return Some(Value::from(array.value(row)));
    }
    if let Some(array) = any.downcast_ref::<Int64Array>() {
        return Some(Value::from(array.value(row)));
    }
    if let Some(array) = any.downcast_ref::<Int32Array>() {
        return Some(Value::from(array.value(row)));
    }
    if let Some(array) = any.downcast_ref::<Float64Array>() {
        return serde_json::Number::from_f64(array.value(row)).map(Value::Number);
    }
    if let Some(array) = any.downcast_ref::<Float32Array>() {
        return serde_json::Number::from_f64(array.value(row) as f64).map(Value::Number);
    }
    if let Some(array) = any.downcast_ref::<BooleanArray>() {
        return Some(Value::from(array.value(row)));
    }
    None
}

/// CRS from the PROJJSON `id` member (`{"authority": "EPSG", "code": 32633}`)
fn crs_from_projjson(projjson: &Value) -> Option<Crs> {
    let id = projjson.get("id")?;
    let authority = id.get("authority")?.as_str()?;
    let code = match id.get("code")? {
        Value::Number(n) => n.as_u64()? as u32,
        Value::String(s) => s.parse().ok()?,
        _ => return None,
    };

    match authority.to_ascii_uppercase().as_str() {
        "EPSG" => Some(Crs::epsg(code)),
        "OGC" => Some(Crs::wgs84()),
        "ESRI" if code == 54009 => Some(Crs::mollweide()),
        "ESRI" => {
            let name = projjson.get("name").and_then(Value::as_str).unwrap_or("ESRI");
            Some(Crs::new(CrsAuthority::Esri, code, name))
        }
        _ => {
            tracing::warn!(authority, code, "Unknown CRS authority in GeoParquet metadata");
            None
        }
    }
}
