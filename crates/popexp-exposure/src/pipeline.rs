//! Exposure workflows: population per hazard, per hazard and spatial unit, and
//! resident population per spatial unit.

use popexp_core::config::LayeredConfig;
use popexp_core::error::Result;
use popexp_core::models::{ExposureResult, MergedRegion, VectorDataset, DEFAULT_ID_SEPARATOR};
use popexp_core::ports::PopulationGrid;
use popexp_geo::{
    bounding_windows, buffer_hazards, merge_overlapping, normalize_hazards, normalize_units, overlay_regions_units,
    regions_from_hazards, NormalizeOptions,
};

use crate::coverage::CoverageMode;
use crate::progress::{NoopObserver, ProgressObserver, Stage};
use crate::zonal::{ZonalAggregator, ZonalInput};

static NOOP: NoopObserver = NoopObserver;

/// Settings of a single exposure run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Report every hazard on its own instead of merging overlapping footprints
    pub by_unique_hazard: bool,
    pub id_separator: String,
    /// Margin added around every geometry's raster window, in degrees
    pub window_margin: f64,
    pub normalize: NormalizeOptions,
    pub coverage: CoverageMode,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            by_unique_hazard: false,
            id_separator: DEFAULT_ID_SEPARATOR.to_string(),
            window_margin: 0.0,
            normalize: NormalizeOptions::default(),
            coverage: CoverageMode::default(),
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &LayeredConfig, by_unique_hazard: bool) -> Self {
        Self {
            by_unique_hazard,
            id_separator: config.id_separator.value.clone(),
            window_margin: config.window_margin.value,
            normalize: NormalizeOptions {
                hazard_id_column: config.hazard_id_column.value.clone(),
                buffer_column: config.buffer_column.value.clone(),
                unit_id_column: config.unit_id_column.value.clone(),
                validity_mode: config.validity_mode.value,
            },
            coverage: CoverageMode::default(),
        }
    }

    pub fn with_coverage(mut self, coverage: CoverageMode) -> Self {
        self.coverage = coverage;
        self
    }
}

/// Exposure workflows over one population grid
pub struct ExposurePipeline<'a> {
    grid: &'a dyn PopulationGrid,
    options: PipelineOptions,
    observer: &'a dyn ProgressObserver,
}

impl<'a> ExposurePipeline<'a> {
    /// Create a new exposure pipeline
    pub fn new(grid: &'a dyn PopulationGrid, options: PipelineOptions) -> Self {
        Self { grid, options, observer: &NOOP }
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Population per hazard, or per merged hazard region unless `by_unique_hazard` is set
    pub fn hazard_exposure(&self, hazards: &VectorDataset) -> Result<Vec<ExposureResult>> {
        let regions = self.hazard_regions(hazards, 0)?;

        let windows = self.windows(regions.iter().map(|r| &r.geometry));
        let inputs: Vec<ZonalInput<'_>> = regions
            .iter()
            .zip(windows)
            .map(|(region, window)| ZonalInput::new(self.display_id(region), &region.geometry, window))
            .collect();

        let populations = self.extract(&inputs)?;

        Ok(regions
            .iter()
            .zip(populations)
            .map(|(region, population)| {
                ExposureResult::hazard(self.display_id(region), region.source_ids.clone(), population)
            })
            .collect())
    }

    /// Population per (hazard region, spatial unit) pair, from the parts of each
    /// region inside each unit
    pub fn hazard_unit_exposure(&self, hazards: &VectorDataset, units: &VectorDataset) -> Result<Vec<ExposureResult>> {
        let regions = self.hazard_regions(hazards, units.len())?;

        let units = normalize_units(units, &self.options.normalize)?;
        self.observer.advance(Stage::Normalize, units.len());
        self.observer.stage_finished(Stage::Normalize);

        let pieces = overlay_regions_units(&regions, &units);

        let windows = self.windows(pieces.iter().map(|p| &p.geometry));
        let inputs: Vec<ZonalInput<'_>> = pieces
            .iter()
            .zip(windows)
            .map(|(piece, window)| {
                let id = format!("{}/{}", self.display_id(&regions[piece.region]), units[piece.unit].id);
                ZonalInput::new(id, &piece.geometry, window)
            })
            .collect();

        let populations = self.extract(&inputs)?;

        Ok(pieces
            .iter()
            .zip(populations)
            .map(|(piece, population)| {
                let region = &regions[piece.region];
                ExposureResult::hazard_in_unit(
                    self.display_id(region),
                    region.source_ids.clone(),
                    units[piece.unit].id.clone(),
                    population,
                )
            })
            .collect())
    }

    /// Population living in each spatial unit
    pub fn resident_population(&self, units: &VectorDataset) -> Result<Vec<ExposureResult>> {
        self.observer.stage_started(Stage::Normalize, units.len());
        let units = normalize_units(units, &self.options.normalize)?;
        self.observer.advance(Stage::Normalize, units.len());
        self.observer.stage_finished(Stage::Normalize);

        let windows = self.windows(units.iter().map(|u| &u.geometry));
        let inputs: Vec<ZonalInput<'_>> = units
            .iter()
            .zip(windows)
            .map(|(unit, window)| ZonalInput::new(unit.id.clone(), &unit.geometry, window))
            .collect();

        let populations = self.extract(&inputs)?;

        Ok(units
            .iter()
            .zip(populations)
            .map(|(unit, population)| ExposureResult::resident(unit.id.clone(), population))
            .collect())
    }

    /// Normalize and buffer hazards, then merge them unless `by_unique_hazard` is set.
    ///
    /// `pending_units` extends the normalization stage total for runs that normalize
    /// units afterwards; the stage is left open in that case.
    fn hazard_regions(&self, hazards: &VectorDataset, pending_units: usize) -> Result<Vec<MergedRegion>> {
        self.observer.stage_started(Stage::Normalize, hazards.len() + pending_units);
        let projected = normalize_hazards(hazards, &self.options.normalize)?;
        self.observer.advance(Stage::Normalize, projected.len());
        if pending_units == 0 {
            self.observer.stage_finished(Stage::Normalize);
        }

        self.observer.stage_started(Stage::Buffer, projected.len());
        let buffered = buffer_hazards(&projected, self.options.normalize.validity_mode, || {
            self.observer.advance(Stage::Buffer, 1)
        })?;
        self.observer.stage_finished(Stage::Buffer);

        let regions = regions_from_hazards(&buffered);
        if self.options.by_unique_hazard {
            tracing::info!(hazards = regions.len(), "Reporting hazards individually");
            return Ok(regions);
        }

        Ok(merge_overlapping(&regions, &self.options.id_separator))
    }

    fn windows<'g>(
        &self,
        geometries: impl ExactSizeIterator<Item = &'g geo::MultiPolygon<f64>>,
    ) -> Vec<Option<geo::Rect<f64>>> {
        self.observer.stage_started(Stage::Windows, geometries.len());
        let windows = bounding_windows(geometries, self.options.window_margin);
        self.observer.advance(Stage::Windows, windows.len());
        self.observer.stage_finished(Stage::Windows);
        windows
    }

    fn extract(&self, inputs: &[ZonalInput<'_>]) -> Result<Vec<f64>> {
        self.observer.stage_started(Stage::Extraction, inputs.len());
        let aggregator = ZonalAggregator::new(self.grid, self.options.coverage);
        let populations = aggregator.aggregate(inputs, || self.observer.advance(Stage::Extraction, 1))?;
        self.observer.stage_finished(Stage::Extraction);
        Ok(populations)
    }

    fn display_id(&self, region: &MergedRegion) -> String {
        region.display_id(&self.options.id_separator)
    }
}
