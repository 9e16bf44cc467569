//! Feature records flowing through the exposure pipeline.
//!
//! Each stage consumes a slice of one record type and produces a fresh `Vec` of the
//! next one, so nothing is mutated in place between stages.

use geo::{Geometry, MultiPolygon};
use serde_json::{Map, Value};

use super::geometry::Crs;

/// A feature as delivered by a vector reader, before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    /// Position in the source file
    pub index: usize,

    /// Attribute values keyed by column name
    pub properties: Map<String, Value>,

    /// Geometry in the dataset CRS, `None` when the row has no geometry
    pub geometry: Option<Geometry<f64>>,
}

impl RawFeature {
    pub fn new(index: usize, properties: Map<String, Value>, geometry: Option<Geometry<f64>>) -> Self {
        Self { index, properties, geometry }
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name).filter(|v| !v.is_null())
    }
}

/// Format-neutral vector dataset produced by every [`crate::formats::VectorReader`]
#[derive(Debug, Clone)]
pub struct VectorDataset {
    /// Dataset name, usually the file stem
    pub name: String,

    /// Declared CRS of the geometries
    pub crs: Crs,

    /// Name of the geometry column, `None` if the source has none
    pub geometry_column: Option<String>,

    pub features: Vec<RawFeature>,
}

impl VectorDataset {
    pub fn new(name: impl Into<String>, crs: Crs, features: Vec<RawFeature>) -> Self {
        Self { name: name.into(), crs, geometry_column: Some("geometry".to_string()), features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A hazard footprint with its buffer distance, in the canonical geographic frame
#[derive(Debug, Clone, PartialEq)]
pub struct HazardFeature {
    pub id: String,
    pub geometry: Geometry<f64>,
    /// Buffer distance in meters
    pub buffer_distance: f64,
}

/// A hazard annotated with its representative point and local metric projection
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedHazard {
    pub hazard: HazardFeature,
    pub centroid_lat: f64,
    pub centroid_lon: f64,
    /// UTM zone best suited for metric operations around the centroid
    pub local_projection: Crs,
}

impl ProjectedHazard {
    pub fn id(&self) -> &str {
        &self.hazard.id
    }
}

/// A hazard with its buffered footprint, back in the canonical frame
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedHazard {
    pub hazard: ProjectedHazard,
    /// Areal footprint; empty for points or lines buffered by zero
    pub footprint: MultiPolygon<f64>,
}

impl BufferedHazard {
    pub fn id(&self) -> &str {
        self.hazard.id()
    }
}

/// An administrative or statistical reporting area
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialUnit {
    pub id: String,
    pub geometry: MultiPolygon<f64>,
}
