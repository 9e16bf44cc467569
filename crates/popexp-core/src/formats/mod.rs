//! Format abstraction layer for vector inputs
//!
//! The concrete format is chosen once from the file extension via [`VectorFormat`];
//! every reader produces the same format-neutral [`VectorDataset`].

use std::path::Path;

use crate::error::{ExposureError, Result};
use crate::models::VectorDataset;

pub mod geojson;
pub mod geoparquet;
pub mod geotiff;
pub mod wkb;

pub use self::geojson::GeoJsonReader;
pub use self::geoparquet::GeoParquetReader;
pub use self::geotiff::GeoTiffRaster;

/// Vector reader trait that all vector format implementations must implement
pub trait VectorReader: Send + Sync {
    /// Read a dataset from the given path
    fn read(&self, path: &Path) -> Result<VectorDataset>;

    /// Get supported file extensions (e.g., ["geojson", "json"])
    fn supported_extensions(&self) -> &[&str];

    /// Get human-readable format name (e.g., "GeoJSON")
    fn format_name(&self) -> &str;
}

/// Vector encodings understood by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorFormat {
    GeoJson,
    GeoParquet,
}

impl VectorFormat {
    pub const ALL: [VectorFormat; 2] = [VectorFormat::GeoJson, VectorFormat::GeoParquet];

    /// Detect the format from the path's extension (case-insensitive)
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(|| ExposureError::UnsupportedFileFormat {
                path: path.to_path_buf(),
                reason: format!("no file extension; supported: {}", supported_extensions().join(", ")),
            })?;

        Self::ALL
            .into_iter()
            .find(|format| format.extensions().contains(&extension.as_str()))
            .ok_or_else(|| ExposureError::UnsupportedFileFormat {
                path: path.to_path_buf(),
                reason: format!(
                    "unknown extension '.{}'; supported: {}",
                    extension,
                    supported_extensions().join(", ")
                ),
            })
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            VectorFormat::GeoJson => &["geojson", "json"],
            VectorFormat::GeoParquet => &["parquet", "geoparquet"],
        }
    }

    pub fn reader(&self) -> Box<dyn VectorReader> {
        match self {
            VectorFormat::GeoJson => Box::new(GeoJsonReader),
            VectorFormat::GeoParquet => Box::new(GeoParquetReader),
        }
    }
}

/// All extensions accepted for vector inputs
pub fn supported_extensions() -> Vec<&'static str> {
    VectorFormat::ALL.iter().flat_map(|f| f.extensions().iter().copied()).collect()
}

/// Detect the format of `path` and read it
pub fn read_vector(path: &Path) -> Result<VectorDataset> {
    let reader = VectorFormat::from_path(path)?.reader();
    tracing::debug!(path = %path.display(), format = reader.format_name(), "Reading vector dataset");
    reader.read(path)
}

/// Dataset name from the file stem
pub(crate) fn dataset_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed")
        .to_string()
}
