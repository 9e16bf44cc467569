//! Gridded population rasters: georeferencing, pixel windows and an in-memory grid.

use geo::{coord, Rect};

use crate::error::{ExposureError, Result};
use crate::models::Crs;
use crate::ports::PopulationGrid;

/// North-up affine transform of a raster (no rotation terms)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// X of the top-left corner of the top-left cell
    pub origin_x: f64,
    /// Y of the top-left corner of the top-left cell
    pub origin_y: f64,
    /// Cell width in CRS units
    pub pixel_width: f64,
    /// Cell height in CRS units, positive; rows run southwards
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self { origin_x, origin_y, pixel_width, pixel_height }
    }

    pub fn cell_area(&self) -> f64 {
        self.pixel_width * self.pixel_height
    }

    /// Bounds of a cell as `(min_x, min_y, max_x, max_y)`
    pub fn cell_bounds(&self, col: usize, row: usize) -> (f64, f64, f64, f64) {
        let min_x = self.origin_x + col as f64 * self.pixel_width;
        let max_y = self.origin_y - row as f64 * self.pixel_height;
        (min_x, max_y - self.pixel_height, min_x + self.pixel_width, max_y)
    }

    pub fn row_top(&self, row: usize) -> f64 {
        self.origin_y - row as f64 * self.pixel_height
    }

    pub fn col_left(&self, col: usize) -> f64 {
        self.origin_x + col as f64 * self.pixel_width
    }
}

/// Rectangular block of cells, in pixel offsets from the raster origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelWindow {
    pub fn new(col_off: usize, row_off: usize, width: usize, height: usize) -> Self {
        Self { col_off, row_off, width, height }
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Raster properties needed to georeference and read a population grid
#[derive(Debug, Clone, PartialEq)]
pub struct RasterMetadata {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub nodata: Option<f64>,
    pub crs: Crs,
}

impl RasterMetadata {
    /// Full raster extent in the raster CRS
    pub fn extent(&self) -> Rect<f64> {
        let t = &self.transform;
        Rect::new(
            coord! { x: t.origin_x, y: t.origin_y - self.height as f64 * t.pixel_height },
            coord! { x: t.origin_x + self.width as f64 * t.pixel_width, y: t.origin_y },
        )
    }

    /// Cells covering `rect` (raster CRS), clipped to the raster.
    /// `None` when the rectangle lies entirely outside the extent.
    pub fn pixel_window(&self, rect: &Rect<f64>) -> Option<PixelWindow> {
        let t = &self.transform;
        let col_start = ((rect.min().x - t.origin_x) / t.pixel_width).floor();
        let col_end = ((rect.max().x - t.origin_x) / t.pixel_width).ceil();
        let row_start = ((t.origin_y - rect.max().y) / t.pixel_height).floor();
        let row_end = ((t.origin_y - rect.min().y) / t.pixel_height).ceil();

        if ![col_start, col_end, row_start, row_end].iter().all(|v| v.is_finite()) {
            return None;
        }

        let clamp = |v: f64, max: usize| v.max(0.0).min(max as f64) as usize;
        let col_start = clamp(col_start, self.width);
        let col_end = clamp(col_end, self.width);
        let row_start = clamp(row_start, self.height);
        let row_end = clamp(row_end, self.height);

        if col_start >= col_end || row_start >= row_end {
            return None;
        }

        Some(PixelWindow::new(col_start, row_start, col_end - col_start, row_end - row_start))
    }

    /// Whether a cell value counts as population
    pub fn is_data(&self, value: f64) -> bool {
        value.is_finite() && self.nodata.map_or(true, |nodata| value != nodata)
    }
}

/// Values read from a [`PixelWindow`], row-major
#[derive(Debug, Clone, PartialEq)]
pub struct RasterWindow {
    pub window: PixelWindow,
    pub values: Vec<f64>,
}

impl RasterWindow {
    /// Value at a window-relative cell
    pub fn value(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.window.width || row >= self.window.height {
            return None;
        }
        self.values.get(row * self.window.width + col).copied()
    }
}

/// Population grid held in memory
#[derive(Debug, Clone)]
pub struct MemoryRaster {
    metadata: RasterMetadata,
    values: Vec<f64>,
}

impl MemoryRaster {
    pub fn new(metadata: RasterMetadata, values: Vec<f64>) -> Result<Self> {
        if values.len() != metadata.width * metadata.height {
            return Err(ExposureError::ConfigInvalid {
                key: "raster".to_string(),
                reason: format!(
                    "expected {} values for a {}x{} grid, got {}",
                    metadata.width * metadata.height,
                    metadata.width,
                    metadata.height,
                    values.len()
                ),
            });
        }
        Ok(Self { metadata, values })
    }

    /// Grid where every cell holds `value`
    pub fn uniform(metadata: RasterMetadata, value: f64) -> Self {
        let values = vec![value; metadata.width * metadata.height];
        Self { metadata, values }
    }
}

impl PopulationGrid for MemoryRaster {
    fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    fn read_window(&self, window: PixelWindow) -> Result<RasterWindow> {
        if window.col_off + window.width > self.metadata.width
            || window.row_off + window.height > self.metadata.height
        {
            return Err(ExposureError::ConfigInvalid {
                key: "window".to_string(),
                reason: format!("{:?} exceeds the {}x{} grid", window, self.metadata.width, self.metadata.height),
            });
        }

        let mut values = Vec::with_capacity(window.len());
        for row in window.row_off..window.row_off + window.height {
            let start = row * self.metadata.width + window.col_off;
            values.extend_from_slice(&self.values[start..start + window.width]);
        }
        Ok(RasterWindow { window, values })
    }
}
