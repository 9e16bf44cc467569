//! Port trait definitions
//!
//! These traits define the interfaces that raster adapters must implement.

use crate::error::Result;
use crate::raster::{PixelWindow, RasterMetadata, RasterWindow};

/// Port for reading population counts from a gridded raster
pub trait PopulationGrid: Send + Sync {
    /// Georeferencing, size, nodata and CRS of the grid
    fn metadata(&self) -> &RasterMetadata;

    /// Read the cells of a window. Implementations acquire and release any file
    /// handle within the call.
    fn read_window(&self, window: PixelWindow) -> Result<RasterWindow>;
}
