//! Exposure results.

use serde::{Deserialize, Serialize};

/// Which workflow produced a result set, and therefore which columns it has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExposureKind {
    /// `{hazard_id, population}`
    Hazard,
    /// `{hazard_id, unit_id, population}`
    HazardByUnit,
    /// `{unit_id, population}`
    Resident,
}

impl ExposureKind {
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            ExposureKind::Hazard => &["hazard_id", "population"],
            ExposureKind::HazardByUnit => &["hazard_id", "unit_id", "population"],
            ExposureKind::Resident => &["unit_id", "population"],
        }
    }
}

/// Population attributed to a hazard region, a hazard/unit pair, or a unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureResult {
    /// Hazard id (merged display id when merged) or unit id for resident counts
    pub subject_id: String,

    /// Hazard ids behind `subject_id`; empty for resident counts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_ids: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,

    /// Non-negative population estimate
    pub population: f64,
}

impl ExposureResult {
    pub fn hazard(subject_id: impl Into<String>, source_ids: Vec<String>, population: f64) -> Self {
        Self { subject_id: subject_id.into(), source_ids, unit_id: None, population }
    }

    pub fn hazard_in_unit(
        subject_id: impl Into<String>,
        source_ids: Vec<String>,
        unit_id: impl Into<String>,
        population: f64,
    ) -> Self {
        Self { subject_id: subject_id.into(), source_ids, unit_id: Some(unit_id.into()), population }
    }

    pub fn resident(unit_id: impl Into<String>, population: f64) -> Self {
        let unit_id = unit_id.into();
        Self { subject_id: unit_id.clone(), source_ids: Vec::new(), unit_id: Some(unit_id), population }
    }

    /// Values in the column order of `kind`
    pub fn record(&self, kind: ExposureKind) -> Vec<String> {
        let population = self.population.to_string();
        let unit = self.unit_id.clone().unwrap_or_default();
        match kind {
            ExposureKind::Hazard => vec![self.subject_id.clone(), population],
            ExposureKind::HazardByUnit => vec![self.subject_id.clone(), unit, population],
            ExposureKind::Resident => vec![unit, population],
        }
    }
}
