//! Intersection of hazard regions with spatial units.

use geo::{Area, BooleanOps, BoundingRect, MultiPolygon};
use rayon::prelude::*;

use popexp_core::models::{MergedRegion, SpatialUnit};

use crate::index::SpatialIndex;

/// The part of one region that falls inside one unit
#[derive(Debug, Clone, PartialEq)]
pub struct RegionUnitPiece {
    /// Index into the region slice
    pub region: usize,
    /// Index into the unit slice
    pub unit: usize,
    pub geometry: MultiPolygon<f64>,
}

/// Intersect every region with every unit it overlaps.
///
/// Pieces without area are dropped. Output is ordered by region, then unit.
pub fn overlay_regions_units(regions: &[MergedRegion], units: &[SpatialUnit]) -> Vec<RegionUnitPiece> {
    let index = SpatialIndex::from_geometries(units.iter().map(|u| &u.geometry));

    let pieces: Vec<RegionUnitPiece> = regions
        .par_iter()
        .enumerate()
        .map(|(r, region)| {
            let Some(rect) = region.geometry.bounding_rect() else {
                return Vec::new();
            };
            index
                .query_rect(&rect)
                .into_iter()
                .filter_map(|u| {
                    let geometry = region.geometry.intersection(&units[u].geometry);
                    (geometry.unsigned_area() > 0.0).then_some(RegionUnitPiece { region: r, unit: u, geometry })
                })
                .collect::<Vec<_>>()
        })
        .flatten()
        .collect();

    tracing::info!(regions = regions.len(), units = units.len(), pieces = pieces.len(), "Intersected hazards with spatial units");
    pieces
}
