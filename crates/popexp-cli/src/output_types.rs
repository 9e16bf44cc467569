use popexp_core::config::ConfigSource;
use popexp_core::models::{ExposureKind, ExposureResult};
use serde::Serialize;
use tabled::Tabled;

/// Output for the exposure commands
#[derive(Debug, Serialize)]
pub struct ExposureOutput {
    pub kind: ExposureKind,
    pub columns: Vec<String>,
    pub rows: Vec<ExposureResult>,
    pub total_population: f64,
    pub output_path: Option<String>,
}

impl ExposureOutput {
    pub fn new(kind: ExposureKind, rows: Vec<ExposureResult>, output_path: Option<String>) -> Self {
        Self {
            kind,
            columns: kind.columns().iter().map(|c| c.to_string()).collect(),
            total_population: rows.iter().map(|r| r.population).sum(),
            rows,
            output_path,
        }
    }
}

/// Output for the config command
#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    pub entries: Vec<ConfigEntry>,
}

#[derive(Debug, Serialize, Tabled)]
pub struct ConfigEntry {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Source", display_with = "display_source")]
    pub source: ConfigSource,
}

fn display_source(source: &ConfigSource) -> String {
    format!("{:?}", source)
}

#[derive(Tabled)]
pub struct HazardRow {
    #[tabled(rename = "Hazard")]
    pub hazard_id: String,
    #[tabled(rename = "Population")]
    pub population: String,
}

#[derive(Tabled)]
pub struct HazardUnitRow {
    #[tabled(rename = "Hazard")]
    pub hazard_id: String,
    #[tabled(rename = "Unit")]
    pub unit_id: String,
    #[tabled(rename = "Population")]
    pub population: String,
}

#[derive(Tabled)]
pub struct ResidentRow {
    #[tabled(rename = "Unit")]
    pub unit_id: String,
    #[tabled(rename = "Population")]
    pub population: String,
}

pub fn format_population(population: f64) -> String {
    format!("{:.2}", population)
}

impl From<&ExposureResult> for HazardRow {
    fn from(r: &ExposureResult) -> Self {
        Self { hazard_id: r.subject_id.clone(), population: format_population(r.population) }
    }
}

impl From<&ExposureResult> for HazardUnitRow {
    fn from(r: &ExposureResult) -> Self {
        Self {
            hazard_id: r.subject_id.clone(),
            unit_id: r.unit_id.clone().unwrap_or_default(),
            population: format_population(r.population),
        }
    }
}

impl From<&ExposureResult> for ResidentRow {
    fn from(r: &ExposureResult) -> Self {
        Self { unit_id: r.subject_id.clone(), population: format_population(r.population) }
    }
}
