//! Hazard regions with provenance.

use geo::{Area, MultiPolygon};

/// Separator used when rendering merged identifiers
pub const DEFAULT_ID_SEPARATOR: &str = "___";

/// A non-overlapping region made of one or more hazard footprints.
///
/// `source_ids` is the authoritative provenance; any joined identifier is derived
/// from it and never parsed back.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRegion {
    /// Contributing hazard ids in encounter order
    pub source_ids: Vec<String>,
    pub geometry: MultiPolygon<f64>,
}

impl MergedRegion {
    pub fn new(source_ids: Vec<String>, geometry: MultiPolygon<f64>) -> Self {
        Self { source_ids, geometry }
    }

    /// Region made of a single hazard
    pub fn single(id: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        Self { source_ids: vec![id.into()], geometry }
    }

    /// Identifier joined with [`DEFAULT_ID_SEPARATOR`]
    pub fn merged_id(&self) -> String {
        self.display_id(DEFAULT_ID_SEPARATOR)
    }

    /// Identifier joined with a custom separator. A single source keeps its id as-is.
    pub fn display_id(&self, separator: &str) -> String {
        self.source_ids.join(separator)
    }

    pub fn is_merged(&self) -> bool {
        self.source_ids.len() > 1
    }

    pub fn area(&self) -> f64 {
        self.geometry.unsigned_area()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_single_region_keeps_id() {
        let region = MergedRegion::single("fire-1", MultiPolygon::new(vec![]));
        assert_eq!(region.merged_id(), "fire-1");
        assert!(!region.is_merged());
    }

    #[test]
    fn test_merged_id_joins_in_order() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let region = MergedRegion::new(
            vec!["b".to_string(), "a".to_string()],
            MultiPolygon::new(vec![square]),
        );
        assert_eq!(region.merged_id(), "b___a");
        assert_eq!(region.display_id("|"), "b|a");
        assert!((region.area() - 1.0).abs() < 1e-12);
    }
}
