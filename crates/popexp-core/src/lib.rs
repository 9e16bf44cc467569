//! Pop-Exposure Core - Domain models, configuration, and input formats
//!
//! This crate holds the records exchanged between pipeline stages, the layered
//! configuration, the vector readers and the population raster port.

pub mod config;
pub mod error;
pub mod formats;
pub mod models;
pub mod ports;
pub mod raster;

pub use error::{ExposureError, Result};
