//! Exposure command implementations

use crate::cli::{ByUnitArgs, HazardsArgs, ResidentsArgs, RunArgs};
use crate::errors::input_not_found;
use crate::output::{write_csv, OutputWriter};
use crate::output_types::{format_population, ExposureOutput, HazardRow, HazardUnitRow, ResidentRow};
use crate::progress::StageProgress;
use anyhow::{Context, Result};
use popexp_core::config::LayeredConfig;
use popexp_core::formats::{read_vector, GeoTiffRaster};
use popexp_core::models::{ExposureKind, ExposureResult, VectorDataset};
use popexp_exposure::{CoverageMode, ExposurePipeline, PipelineOptions};
use std::path::Path;

pub fn hazards(args: HazardsArgs, config: &LayeredConfig, output: &OutputWriter) -> Result<()> {
    let hazards = read_dataset("Hazard", &args.hazards)?;
    let raster = open_raster(&args.run.raster, config)?;

    let progress = StageProgress::new(output.is_json());
    let pipeline = ExposurePipeline::new(&raster, options(config, args.by_unique_hazard, &args.run))
        .with_observer(&progress);
    let results = pipeline.hazard_exposure(&hazards).context("Hazard exposure failed")?;

    report(ExposureKind::Hazard, results, &args.run, output)
}

pub fn by_unit(args: ByUnitArgs, config: &LayeredConfig, output: &OutputWriter) -> Result<()> {
    let hazards = read_dataset("Hazard", &args.hazards)?;
    let units = read_dataset("Spatial unit", &args.units)?;
    let raster = open_raster(&args.run.raster, config)?;

    let progress = StageProgress::new(output.is_json());
    let pipeline = ExposurePipeline::new(&raster, options(config, args.by_unique_hazard, &args.run))
        .with_observer(&progress);
    let results = pipeline
        .hazard_unit_exposure(&hazards, &units)
        .context("Hazard exposure by spatial unit failed")?;

    report(ExposureKind::HazardByUnit, results, &args.run, output)
}

pub fn residents(args: ResidentsArgs, config: &LayeredConfig, output: &OutputWriter) -> Result<()> {
    let units = read_dataset("Spatial unit", &args.units)?;
    let raster = open_raster(&args.run.raster, config)?;

    let progress = StageProgress::new(output.is_json());
    let pipeline = ExposurePipeline::new(&raster, options(config, false, &args.run)).with_observer(&progress);
    let results = pipeline.resident_population(&units).context("Resident population failed")?;

    report(ExposureKind::Resident, results, &args.run, output)
}

fn options(config: &LayeredConfig, by_unique_hazard: bool, run: &RunArgs) -> PipelineOptions {
    let coverage = if run.all_touched { CoverageMode::AllTouched } else { CoverageMode::Fractional };
    PipelineOptions::from_config(config, by_unique_hazard).with_coverage(coverage)
}

fn read_dataset(kind: &str, path: &Path) -> Result<VectorDataset> {
    if !path.exists() {
        return Err(input_not_found(kind, path).into());
    }
    let dataset = read_vector(path)?;
    tracing::info!(path = %path.display(), features = dataset.len(), crs = %dataset.crs, "Read vector dataset");
    Ok(dataset)
}

fn open_raster(path: &Path, config: &LayeredConfig) -> Result<GeoTiffRaster> {
    if !path.exists() {
        return Err(input_not_found("Raster", path).into());
    }
    Ok(GeoTiffRaster::open(path, &config.raster_crs.value)?)
}

fn report(kind: ExposureKind, results: Vec<ExposureResult>, run: &RunArgs, output: &OutputWriter) -> Result<()> {
    if let Some(path) = &run.output {
        write_csv(path, kind, &results)?;
    }

    let result = ExposureOutput::new(kind, results, run.output.as_ref().map(|p| p.display().to_string()));
    if output.is_json() {
        return output.result(result);
    }

    match kind {
        ExposureKind::Hazard => output.table(result.rows.iter().map(HazardRow::from).collect()),
        ExposureKind::HazardByUnit => output.table(result.rows.iter().map(HazardUnitRow::from).collect()),
        ExposureKind::Resident => output.table(result.rows.iter().map(ResidentRow::from).collect()),
    }

    output.kv("Rows", result.rows.len());
    output.kv("Total population", format_population(result.total_population));
    if let Some(path) = &result.output_path {
        output.success(format!("Results written to {}", path));
    }
    Ok(())
}
