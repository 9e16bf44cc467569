//! Error types for population exposure runs

use std::path::PathBuf;
use thiserror::Error;

/// Placeholder used when an error is raised before the offending feature is known.
pub const UNKNOWN_FEATURE: &str = "unknown";

#[derive(Debug, Error)]
pub enum ExposureError {
    // Input errors
    #[error("Unsupported file format for {path}: {reason}")]
    UnsupportedFileFormat { path: PathBuf, reason: String },

    #[error("Dataset {dataset} has no geometry column")]
    MissingGeometryColumn { dataset: String },

    #[error("Feature {feature_id} is missing required attribute '{attribute}'")]
    MissingRequiredAttribute { attribute: String, feature_id: String },

    #[error("Identifier '{id}' appears more than once in dataset {dataset}")]
    DuplicateIdentifier { id: String, dataset: String },

    // Feature errors
    #[error("Invalid coordinate (lat {lat}, lon {lon}) for feature {feature_id}")]
    InvalidCoordinate { feature_id: String, lat: f64, lon: f64 },

    #[error("Invalid buffer distance {distance} for feature {feature_id}")]
    InvalidBufferDistance { feature_id: String, distance: f64 },

    #[error("Geometry of feature {feature_id} cannot be repaired: {reason}")]
    GeometryRepairFailure { feature_id: String, reason: String },

    // Raster errors
    #[error("Raster window for feature {feature_id} lies outside the raster extent")]
    RasterWindowOutOfBounds { feature_id: String },

    // Projection errors
    #[error("Projection from {from} to {to} failed{}: {reason}", feature_suffix(.feature_id))]
    Projection { from: String, to: String, reason: String, feature_id: Option<String> },

    // Configuration errors
    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExposureError {
    /// Attach the offending feature id to feature-scoped and projection errors.
    pub fn with_feature_id(self, id: &str) -> Self {
        match self {
            ExposureError::InvalidCoordinate { lat, lon, .. } => {
                ExposureError::InvalidCoordinate { feature_id: id.to_string(), lat, lon }
            }
            ExposureError::InvalidBufferDistance { distance, .. } => {
                ExposureError::InvalidBufferDistance { feature_id: id.to_string(), distance }
            }
            ExposureError::GeometryRepairFailure { reason, .. } => {
                ExposureError::GeometryRepairFailure { feature_id: id.to_string(), reason }
            }
            ExposureError::RasterWindowOutOfBounds { .. } => {
                ExposureError::RasterWindowOutOfBounds { feature_id: id.to_string() }
            }
            ExposureError::MissingRequiredAttribute { attribute, .. } => {
                ExposureError::MissingRequiredAttribute { attribute, feature_id: id.to_string() }
            }
            ExposureError::Projection { from, to, reason, .. } => {
                ExposureError::Projection { from, to, reason, feature_id: Some(id.to_string()) }
            }
            other => other,
        }
    }

    /// Whether the error concerns a single feature and may be skipped in lenient mode.
    pub fn is_feature_scoped(&self) -> bool {
        matches!(
            self,
            ExposureError::InvalidCoordinate { .. }
                | ExposureError::InvalidBufferDistance { .. }
                | ExposureError::GeometryRepairFailure { .. }
        )
    }
}

fn feature_suffix(feature_id: &Option<String>) -> String {
    match feature_id {
        Some(id) => format!(" for feature {}", id),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, ExposureError>;
