//! Zonal Aggregator: population sums of canonical-frame geometries over a grid.

use geo::{Area, BoundingRect, MultiPolygon, Rect};
use rayon::prelude::*;

use popexp_core::error::{ExposureError, Result};
use popexp_core::models::Crs;
use popexp_core::ports::PopulationGrid;
use popexp_geo::transform::Reprojector;

use crate::coverage::{coverage_weights, CoverageMode};

/// One geometry to aggregate, with the window that bounds its raster read
#[derive(Debug, Clone)]
pub struct ZonalInput<'a> {
    /// Used in log and error messages
    pub id: String,
    pub geometry: &'a MultiPolygon<f64>,
    /// Read window in the canonical frame; `None` for empty geometries
    pub window: Option<Rect<f64>>,
}

impl<'a> ZonalInput<'a> {
    pub fn new(id: impl Into<String>, geometry: &'a MultiPolygon<f64>, window: Option<Rect<f64>>) -> Self {
        Self { id: id.into(), geometry, window }
    }
}

/// Sums population under geometries, weighting each cell by its coverage
pub struct ZonalAggregator<'g> {
    grid: &'g dyn PopulationGrid,
    coverage: CoverageMode,
}

impl<'g> ZonalAggregator<'g> {
    pub fn new(grid: &'g dyn PopulationGrid, coverage: CoverageMode) -> Self {
        Self { grid, coverage }
    }

    /// Population of a single geometry. Never negative; zero when the geometry
    /// has no area or misses the raster.
    pub fn population(&self, input: &ZonalInput<'_>) -> Result<f64> {
        let reprojector = self.reprojector()?;
        self.population_with(&reprojector, input)
    }

    /// Populations in input order, computed in parallel.
    ///
    /// `on_done` is called once per input from worker threads.
    pub fn aggregate<F>(&self, inputs: &[ZonalInput<'_>], on_done: F) -> Result<Vec<f64>>
    where
        F: Fn() + Sync + Send,
    {
        // Fail early on an unusable raster CRS before spawning work
        let raster_crs = self.reprojector()?.target().clone();

        let populations = inputs
            .par_iter()
            .map_init(
                || Reprojector::new(&Crs::wgs84(), &raster_crs),
                |reprojector, input| {
                    let reprojector = reprojector.as_ref().map_err(|e| ExposureError::Projection {
                        from: Crs::wgs84().to_string(),
                        to: raster_crs.to_string(),
                        reason: e.to_string(),
                        feature_id: Some(input.id.clone()),
                    })?;
                    let population = self.population_with(reprojector, input);
                    on_done();
                    population
                },
            )
            .collect::<Result<Vec<f64>>>()?;

        tracing::info!(
            geometries = inputs.len(),
            total = populations.iter().sum::<f64>(),
            "Aggregated population"
        );
        Ok(populations)
    }

    fn reprojector(&self) -> Result<Reprojector> {
        Reprojector::new(&Crs::wgs84(), &self.grid.metadata().crs)
    }

    fn population_with(&self, reprojector: &Reprojector, input: &ZonalInput<'_>) -> Result<f64> {
        match self.extract(reprojector, input) {
            Err(ExposureError::RasterWindowOutOfBounds { feature_id }) => {
                tracing::debug!(feature_id = %feature_id, "Window outside raster extent, population 0");
                Ok(0.0)
            }
            other => other,
        }
    }

    fn extract(&self, reprojector: &Reprojector, input: &ZonalInput<'_>) -> Result<f64> {
        let Some(window) = input.window else {
            return Ok(0.0);
        };
        if input.geometry.unsigned_area() == 0.0 {
            return Ok(0.0);
        }

        let projected = reprojector.multi_polygon(input.geometry).map_err(|e| e.with_feature_id(&input.id))?;
        let mut bounds = reprojector.rect(&window).map_err(|e| e.with_feature_id(&input.id))?;
        if let Some(extent) = projected.bounding_rect() {
            bounds = union(&bounds, &extent);
        }

        let metadata = self.grid.metadata();
        let pixels = metadata
            .pixel_window(&bounds)
            .ok_or_else(|| ExposureError::RasterWindowOutOfBounds { feature_id: input.id.clone() })?;

        let cells = self.grid.read_window(pixels)?;
        let weights = coverage_weights(&projected, &metadata.transform, pixels, self.coverage);

        // Negative cells carry no population
        let sum: f64 = cells
            .values
            .iter()
            .zip(&weights)
            .filter(|(value, weight)| **weight > 0.0 && metadata.is_data(**value) && **value > 0.0)
            .map(|(value, weight)| value * weight)
            .sum();

        tracing::debug!(feature_id = %input.id, cells = pixels.len(), population = sum, "Extracted window");
        Ok(sum)
    }
}

fn union(a: &Rect<f64>, b: &Rect<f64>) -> Rect<f64> {
    Rect::new(
        geo::coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
        geo::coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use popexp_core::raster::{GeoTransform, MemoryRaster, RasterMetadata};
    use popexp_geo::bounding_window;

    /// 10x10 degree grid of 1 degree cells over lon 0..10, lat 0..10
    fn grid(value: f64, nodata: Option<f64>) -> MemoryRaster {
        let metadata = RasterMetadata {
            width: 10,
            height: 10,
            transform: GeoTransform::new(0.0, 10.0, 1.0, 1.0),
            nodata,
            crs: Crs::wgs84(),
        };
        MemoryRaster::uniform(metadata, value)
    }

    fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ]])
    }

    #[test]
    fn test_fractional_sum() {
        let raster = grid(2.0, None);
        let aggregator = ZonalAggregator::new(&raster, CoverageMode::Fractional);
        let geometry = square(1.5, 1.5, 2.0);

        let population = aggregator
            .population(&ZonalInput::new("h", &geometry, bounding_window(&geometry, 0.0)))
            .unwrap();
        assert!((population - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_outside_extent_is_exactly_zero() {
        let raster = grid(5.0, None);
        let aggregator = ZonalAggregator::new(&raster, CoverageMode::Fractional);
        let geometry = square(50.0, 50.0, 1.0);

        let population = aggregator
            .population(&ZonalInput::new("far", &geometry, bounding_window(&geometry, 0.0)))
            .unwrap();
        assert_eq!(population, 0.0);
    }

    #[test]
    fn test_nodata_cells_are_skipped() {
        let raster = grid(-9999.0, Some(-9999.0));
        let aggregator = ZonalAggregator::new(&raster, CoverageMode::Fractional);
        let geometry = square(1.0, 1.0, 3.0);

        let population = aggregator
            .population(&ZonalInput::new("h", &geometry, bounding_window(&geometry, 0.0)))
            .unwrap();
        assert_eq!(population, 0.0);
    }

    #[test]
    fn test_margin_does_not_change_sum() {
        let raster = grid(1.0, None);
        let aggregator = ZonalAggregator::new(&raster, CoverageMode::Fractional);
        let geometry = square(4.25, 4.25, 0.5);

        let tight = aggregator.population(&ZonalInput::new("h", &geometry, bounding_window(&geometry, 0.0))).unwrap();
        let wide = aggregator.population(&ZonalInput::new("h", &geometry, bounding_window(&geometry, 2.0))).unwrap();
        assert!((tight - 0.25).abs() < 1e-12);
        assert!((tight - wide).abs() < 1e-12);
    }

    #[test]
    fn test_projection_failure_names_geometry() {
        let metadata = RasterMetadata {
            width: 10,
            height: 10,
            transform: GeoTransform::new(500_000.0, 10_000.0, 1000.0, 1000.0),
            nodata: None,
            crs: Crs::epsg(32633),
        };
        let raster = MemoryRaster::uniform(metadata, 1.0);
        let aggregator = ZonalAggregator::new(&raster, CoverageMode::Fractional);
        let geometry = square(13.0, 95.0, 1.0);

        let err = aggregator
            .aggregate(&[ZonalInput::new("polar", &geometry, bounding_window(&geometry, 0.0))], || {})
            .unwrap_err();
        assert!(matches!(err, ExposureError::Projection { ref feature_id, .. } if feature_id.as_deref() == Some("polar")));
    }

    #[test]
    fn test_aggregate_keeps_order_and_zero_area() {
        let raster = grid(1.0, None);
        let aggregator = ZonalAggregator::new(&raster, CoverageMode::Fractional);
        let big = square(0.0, 0.0, 4.0);
        let small = square(6.0, 6.0, 1.0);
        let empty = MultiPolygon::new(vec![]);

        let inputs = vec![
            ZonalInput::new("big", &big, bounding_window(&big, 0.0)),
            ZonalInput::new("empty", &empty, bounding_window(&empty, 0.0)),
            ZonalInput::new("small", &small, bounding_window(&small, 0.0)),
        ];
        let populations = aggregator.aggregate(&inputs, || {}).unwrap();

        assert_eq!(populations.len(), 3);
        assert!((populations[0] - 16.0).abs() < 1e-9);
        assert_eq!(populations[1], 0.0);
        assert!((populations[2] - 1.0).abs() < 1e-9);
    }
}
