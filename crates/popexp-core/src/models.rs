pub mod exposure;
pub mod feature;
pub mod geometry;
pub mod region;

pub use exposure::{ExposureKind, ExposureResult};
pub use feature::{
    BufferedHazard, HazardFeature, ProjectedHazard, RawFeature, SpatialUnit, VectorDataset,
};
pub use geometry::{Crs, CrsAuthority, ValidityMode};
pub use region::{MergedRegion, DEFAULT_ID_SEPARATOR};
