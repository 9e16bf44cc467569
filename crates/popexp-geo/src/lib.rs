//! Pop-Exposure Geo - Projection, repair, buffering, and overlap merging
//!
//! This crate handles all vector geometry work of an exposure run: choosing a
//! local metric frame per hazard, repairing and reprojecting inputs, buffering,
//! merging overlapping footprints and intersecting them with spatial units.

pub mod bounds;
pub mod buffer;
pub mod index;
pub mod merge;
pub mod normalize;
pub mod overlay;
pub mod projection;
pub mod transform;
pub mod validation;

pub use bounds::{bounding_window, bounding_windows};
pub use buffer::{buffer_hazard, buffer_hazards};
pub use merge::{merge_overlapping, regions_from_hazards};
pub use normalize::{normalize_hazards, normalize_units, NormalizeOptions};
pub use overlay::{overlay_regions_units, RegionUnitPiece};
pub use projection::{select_projection, LocalProjection};
pub use transform::Reprojector;
