//! Pop-Exposure Exposure - Zonal aggregation and exposure workflows
//!
//! This crate turns normalized hazards and spatial units into population counts:
//! exact cell coverage, the zonal aggregator over a [`PopulationGrid`] and the
//! three exposure pipelines.
//!
//! [`PopulationGrid`]: popexp_core::ports::PopulationGrid

pub mod coverage;
pub mod pipeline;
pub mod progress;
pub mod zonal;

pub use coverage::{coverage_weights, CoverageMode};
pub use pipeline::{ExposurePipeline, PipelineOptions};
pub use progress::{NoopObserver, ProgressObserver, Stage};
pub use zonal::{ZonalAggregator, ZonalInput};
