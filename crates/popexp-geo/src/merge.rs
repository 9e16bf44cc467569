//! Overlap Merger: collapses hazards whose footprints touch or overlap into
//! non-overlapping regions that remember every contributing id.

use geo::{Area, BooleanOps, BoundingRect, Intersects, MultiPolygon, Polygon};

use popexp_core::models::{BufferedHazard, MergedRegion};

use crate::index::SpatialIndex;

/// Region for every buffered hazard, without merging
pub fn regions_from_hazards(hazards: &[BufferedHazard]) -> Vec<MergedRegion> {
    hazards.iter().map(|h| MergedRegion::single(h.id(), h.footprint.clone())).collect()
}

/// One exploded polygon and the input region it came from
struct Part {
    input: usize,
    polygon: Polygon<f64>,
}

/// Disjoint-set forest over part indices
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self { parent: (0..len).collect() }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Join two sets, keeping the smaller index as root
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

/// Merge regions whose geometries intersect (touching counts) into connected,
/// pairwise disjoint regions.
///
/// Multi-part inputs are exploded first so that each part joins only the
/// neighbours it actually touches. A component built from a single input keeps
/// that input's polygons verbatim; otherwise its geometry is the union of its
/// parts. Regions are ordered by their earliest input, `source_ids` follow input
/// order without repeats, and components that end up with identical provenance
/// are coalesced into one region. Inputs without area pass through as their own
/// empty regions.
pub fn merge_overlapping(regions: &[MergedRegion], separator: &str) -> Vec<MergedRegion> {
    for region in regions {
        for id in region.source_ids.iter().filter(|id| id.contains(separator)) {
            tracing::warn!(
                id = %id,
                separator,
                "Hazard id contains the id separator; joined ids will be ambiguous"
            );
        }
    }

    let parts: Vec<Part> = regions
        .iter()
        .enumerate()
        .flat_map(|(input, region)| {
            region
                .geometry
                .0
                .iter()
                .filter(|polygon| polygon.unsigned_area() > 0.0)
                .map(move |polygon| Part { input, polygon: polygon.clone() })
        })
        .collect();

    let polygons: Vec<&Polygon<f64>> = parts.iter().map(|p| &p.polygon).collect();
    let index = SpatialIndex::from_geometries(polygons.iter().copied());
    let mut sets = DisjointSet::new(parts.len());

    for (i, part) in parts.iter().enumerate() {
        let Some(rect) = part.polygon.bounding_rect() else {
            continue;
        };
        for j in index.query_rect(&rect) {
            if j > i && sets.find(i) != sets.find(j) && part.polygon.intersects(&parts[j].polygon) {
                sets.union(i, j);
            }
        }
    }

    // Roots are the smallest part index of each component, so sorting by root
    // orders components by their earliest input.
    let mut component_of_root: Vec<Option<usize>> = vec![None; parts.len()];
    let mut components: Vec<Vec<usize>> = Vec::new();
    for i in 0..parts.len() {
        let root = sets.find(i);
        match component_of_root[root] {
            Some(c) => components[c].push(i),
            None => {
                component_of_root[root] = Some(components.len());
                components.push(vec![i]);
            }
        }
    }

    let mut keyed: Vec<(usize, MergedRegion)> = components
        .iter()
        .map(|members| build_region(regions, &parts, members))
        .collect();

    let mut has_area = vec![false; regions.len()];
    for part in &parts {
        has_area[part.input] = true;
    }
    for (input, region) in regions.iter().enumerate() {
        if !has_area[input] {
            keyed.push((input, MergedRegion::new(region.source_ids.clone(), MultiPolygon::new(vec![]))));
        }
    }
    keyed.sort_by_key(|(input, _)| *input);

    let merged = coalesce(keyed.into_iter().map(|(_, region)| region));

    tracing::info!(
        input = regions.len(),
        parts = parts.len(),
        regions = merged.len(),
        "Merged overlapping hazard footprints"
    );
    merged
}

/// Region for one connected component, keyed by its earliest input
fn build_region(regions: &[MergedRegion], parts: &[Part], members: &[usize]) -> (usize, MergedRegion) {
    let mut inputs: Vec<usize> = members.iter().map(|&m| parts[m].input).collect();
    inputs.sort_unstable();
    inputs.dedup();

    let mut source_ids: Vec<String> = Vec::new();
    for &input in &inputs {
        for id in &regions[input].source_ids {
            if !source_ids.contains(id) {
                source_ids.push(id.clone());
            }
        }
    }

    let geometry = if inputs.len() == 1 && !interiors_overlap(parts, members) {
        MultiPolygon::new(members.iter().map(|&m| parts[m].polygon.clone()).collect())
    } else {
        geo::unary_union(members.iter().map(|&m| &parts[m].polygon))
    };

    (inputs[0], MergedRegion::new(source_ids, geometry))
}

/// Whether any two member parts share interior area; touching parts do not
fn interiors_overlap(parts: &[Part], members: &[usize]) -> bool {
    members.iter().enumerate().any(|(k, &a)| {
        members[k + 1..]
            .iter()
            .any(|&b| parts[a].polygon.intersection(&parts[b].polygon).unsigned_area() > 0.0)
    })
}

/// Fold regions with identical `source_ids` into the first of them
fn coalesce(regions: impl Iterator<Item = MergedRegion>) -> Vec<MergedRegion> {
    let mut out: Vec<MergedRegion> = Vec::new();
    for region in regions {
        match out.iter_mut().find(|r| r.source_ids == region.source_ids) {
            Some(existing) => existing.geometry.0.extend(region.geometry.0),
            None => out.push(region),
        }
    }
    out
}
