use clap::{Parser, Subcommand};
use popexp_core::config::{parse_separator, parse_window_margin, CliConfigOverrides};
use popexp_core::models::{Crs, ValidityMode};
use std::path::PathBuf;

/// popexp - Population exposure to geographic hazards
#[derive(Parser, Debug)]
#[command(name = "popexp")]
#[command(about = "Estimate population exposed to buffered hazard footprints", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to ./popexp.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Policy for invalid features
    #[arg(long, global = true)]
    pub validity_mode: Option<ValidityModeArg>,

    /// CRS assumed for rasters that declare none (e.g. ESRI:54009)
    #[arg(long, global = true, value_name = "CRS", value_parser = parse_crs)]
    pub raster_crs: Option<Crs>,

    /// Separator used to join merged hazard ids
    #[arg(long, global = true, value_name = "SEP", value_parser = parse_id_separator)]
    pub id_separator: Option<String>,

    /// Margin added around every raster read window, in degrees
    #[arg(long, global = true, value_name = "DEGREES", value_parser = parse_margin)]
    pub window_margin: Option<f64>,

    /// Hazard identifier attribute
    #[arg(long, global = true, value_name = "COLUMN")]
    pub hazard_id_column: Option<String>,

    /// Buffer distance attribute, in meters
    #[arg(long, global = true, value_name = "COLUMN")]
    pub buffer_column: Option<String>,

    /// Spatial unit identifier attribute
    #[arg(long, global = true, value_name = "COLUMN")]
    pub unit_id_column: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Configuration overrides given on the command line
    pub fn config_overrides(&self) -> CliConfigOverrides {
        CliConfigOverrides {
            hazard_id_column: self.hazard_id_column.clone(),
            buffer_column: self.buffer_column.clone(),
            unit_id_column: self.unit_id_column.clone(),
            id_separator: self.id_separator.clone(),
            window_margin: self.window_margin,
            raster_crs: self.raster_crs.clone(),
            validity_mode: self.validity_mode.map(Into::into),
        }
    }
}

/// Invalid-feature policy selection
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ValidityModeArg {
    /// Abort on the first invalid feature
    Strict,
    /// Skip invalid features with a warning
    Lenient,
}

impl From<ValidityModeArg> for ValidityMode {
    fn from(arg: ValidityModeArg) -> Self {
        match arg {
            ValidityModeArg::Strict => ValidityMode::Strict,
            ValidityModeArg::Lenient => ValidityMode::Lenient,
        }
    }
}

fn parse_crs(s: &str) -> Result<Crs, String> {
    s.parse::<Crs>().map_err(|e| e.to_string())
}

fn parse_margin(s: &str) -> Result<f64, String> {
    parse_window_margin(s).map_err(|e| e.to_string())
}

fn parse_id_separator(s: &str) -> Result<String, String> {
    parse_separator(s).map_err(|e| e.to_string())
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Population exposed to each hazard (merged where footprints overlap)
    Hazards(HazardsArgs),

    /// Population exposed to each hazard within each spatial unit
    ByUnit(ByUnitArgs),

    /// Population living in each spatial unit
    Residents(ResidentsArgs),

    /// Show the effective configuration and where each value comes from
    Config,
}

/// Options shared by every exposure run
#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Population raster (GeoTIFF)
    #[arg(long, value_name = "TIF")]
    pub raster: PathBuf,

    /// Count every cell the geometry touches in full instead of by covered fraction
    #[arg(long)]
    pub all_touched: bool,

    /// Write the result table as CSV
    #[arg(long, short = 'o', value_name = "CSV")]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct HazardsArgs {
    /// Hazard features (GeoJSON or GeoParquet)
    #[arg(long, value_name = "FILE")]
    pub hazards: PathBuf,

    /// Report every hazard on its own, even where footprints overlap
    #[arg(long)]
    pub by_unique_hazard: bool,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Parser, Debug)]
pub struct ByUnitArgs {
    /// Hazard features (GeoJSON or GeoParquet)
    #[arg(long, value_name = "FILE")]
    pub hazards: PathBuf,

    /// Spatial unit polygons (GeoJSON or GeoParquet)
    #[arg(long, value_name = "FILE")]
    pub units: PathBuf,

    /// Report every hazard on its own, even where footprints overlap
    #[arg(long)]
    pub by_unique_hazard: bool,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Parser, Debug)]
pub struct ResidentsArgs {
    /// Spatial unit polygons (GeoJSON or GeoParquet)
    #[arg(long, value_name = "FILE")]
    pub units: PathBuf,

    #[command(flatten)]
    pub run: RunArgs,
}
