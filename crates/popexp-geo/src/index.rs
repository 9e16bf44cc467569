//! R-tree index over geometry envelopes.

use geo::{BoundingRect, Rect};
use rstar::{RTree, RTreeObject, AABB};

/// Envelope of an indexed geometry together with its position in the caller's slice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedGeometry {
    /// Position of the geometry in the indexed collection
    pub id: usize,

    /// Bounding box for spatial indexing
    envelope: AABB<[f64; 2]>,
}

impl IndexedGeometry {
    pub fn new(id: usize, rect: Rect<f64>) -> Self {
        Self { id, envelope: rect_to_aabb(&rect) }
    }
}

impl RTreeObject for IndexedGeometry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn rect_to_aabb(rect: &Rect<f64>) -> AABB<[f64; 2]> {
    let (min, max) = (rect.min(), rect.max());
    AABB::from_corners([min.x, min.y], [max.x, max.y])
}

/// Spatial index for candidate lookups
pub struct SpatialIndex {
    tree: RTree<IndexedGeometry>,
}

impl SpatialIndex {
    /// Index geometries by their position in `geometries`. Empty geometries have
    /// no envelope and are never returned as candidates.
    pub fn from_geometries<'a, G>(geometries: impl IntoIterator<Item = &'a G>) -> Self
    where
        G: BoundingRect<f64, Output = Option<Rect<f64>>> + 'a,
    {
        let indexed: Vec<IndexedGeometry> = geometries
            .into_iter()
            .enumerate()
            .filter_map(|(id, geometry)| geometry.bounding_rect().map(|rect| IndexedGeometry::new(id, rect)))
            .collect();

        Self { tree: RTree::bulk_load(indexed) }
    }

    /// Ids of geometries whose envelopes intersect `rect`, ascending
    pub fn query_rect(&self, rect: &Rect<f64>) -> Vec<usize> {
        let mut ids: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&rect_to_aabb(rect))
            .map(|indexed| indexed.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
