use crate::error::{ExposureError, Result};
use crate::models::{Crs, ValidityMode, DEFAULT_ID_SEPARATOR};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Layered configuration for exposure runs
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub hazard_id_column: ConfigValue<String>,
    pub buffer_column: ConfigValue<String>,
    pub unit_id_column: ConfigValue<String>,
    pub id_separator: ConfigValue<String>,
    pub window_margin: ConfigValue<f64>,
    pub raster_crs: ConfigValue<Crs>,
    pub validity_mode: ConfigValue<ValidityMode>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            hazard_id_column: ConfigValue::new(
                "ID_climate_hazard".to_string(),
                ConfigSource::Default,
            ),
            buffer_column: ConfigValue::new("buffer_dist".to_string(), ConfigSource::Default),
            unit_id_column: ConfigValue::new("ID_spatial_unit".to_string(), ConfigSource::Default),
            id_separator: ConfigValue::new(DEFAULT_ID_SEPARATOR.to_string(), ConfigSource::Default),
            window_margin: ConfigValue::new(0.0, ConfigSource::Default),
            raster_crs: ConfigValue::new(Crs::mollweide(), ConfigSource::Default),
            validity_mode: ConfigValue::new(ValidityMode::Strict, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ExposureError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| ExposureError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(column) = file_config.hazard_id_column {
            self.hazard_id_column.update(column, ConfigSource::File);
        }

        if let Some(column) = file_config.buffer_column {
            self.buffer_column.update(column, ConfigSource::File);
        }

        if let Some(column) = file_config.unit_id_column {
            self.unit_id_column.update(column, ConfigSource::File);
        }

        if let Some(separator) = file_config.id_separator {
            self.id_separator.update(parse_separator(&separator)?, ConfigSource::File);
        }

        if let Some(margin) = file_config.window_margin {
            self.window_margin.update(validate_window_margin(margin)?, ConfigSource::File);
        }

        if let Some(crs) = file_config.raster_crs {
            self.raster_crs.update(crs.parse()?, ConfigSource::File);
        }

        if let Some(mode) = file_config.validity_mode {
            self.validity_mode.update(parse_validity_mode(&mode)?, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load the file layer only when the file exists
    pub fn load_from_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        if path.as_ref().is_file() {
            self.load_from_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        if let Ok(column) = env::var("POPEXP_HAZARD_ID_COLUMN") {
            self.hazard_id_column.update(column, ConfigSource::Environment);
        }

        if let Ok(column) = env::var("POPEXP_BUFFER_COLUMN") {
            self.buffer_column.update(column, ConfigSource::Environment);
        }

        if let Ok(column) = env::var("POPEXP_UNIT_ID_COLUMN") {
            self.unit_id_column.update(column, ConfigSource::Environment);
        }

        if let Ok(separator) = env::var("POPEXP_ID_SEPARATOR") {
            match parse_separator(&separator) {
                Ok(separator) => self.id_separator.update(separator, ConfigSource::Environment),
                Err(_) => tracing::warn!("Ignoring empty POPEXP_ID_SEPARATOR"),
            }
        }

        if let Ok(margin_str) = env::var("POPEXP_WINDOW_MARGIN") {
            match parse_window_margin(&margin_str) {
                Ok(margin) => self.window_margin.update(margin, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid POPEXP_WINDOW_MARGIN value '{}': expected a non-negative number",
                    margin_str
                ),
            }
        }

        if let Ok(crs_str) = env::var("POPEXP_RASTER_CRS") {
            match crs_str.parse::<Crs>() {
                Ok(crs) => self.raster_crs.update(crs, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid POPEXP_RASTER_CRS value '{}': expected AUTHORITY:CODE",
                    crs_str
                ),
            }
        }

        if let Ok(mode_str) = env::var("POPEXP_VALIDITY_MODE") {
            match parse_validity_mode(&mode_str) {
                Ok(mode) => self.validity_mode.update(mode, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid POPEXP_VALIDITY_MODE value '{}': expected strict or lenient",
                    mode_str
                ),
            }
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(column) = overrides.hazard_id_column {
            self.hazard_id_column.update(column, ConfigSource::Cli);
        }

        if let Some(column) = overrides.buffer_column {
            self.buffer_column.update(column, ConfigSource::Cli);
        }

        if let Some(column) = overrides.unit_id_column {
            self.unit_id_column.update(column, ConfigSource::Cli);
        }

        if let Some(separator) = overrides.id_separator {
            self.id_separator.update(separator, ConfigSource::Cli);
        }

        if let Some(margin) = overrides.window_margin {
            self.window_margin.update(margin, ConfigSource::Cli);
        }

        if let Some(crs) = overrides.raster_crs {
            self.raster_crs.update(crs, ConfigSource::Cli);
        }

        if let Some(mode) = overrides.validity_mode {
            self.validity_mode.update(mode, ConfigSource::Cli);
        }
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "hazard_id_column".to_string(),
            (self.hazard_id_column.value.clone(), self.hazard_id_column.source),
        );
        map.insert(
            "buffer_column".to_string(),
            (self.buffer_column.value.clone(), self.buffer_column.source),
        );
        map.insert(
            "unit_id_column".to_string(),
            (self.unit_id_column.value.clone(), self.unit_id_column.source),
        );
        map.insert(
            "id_separator".to_string(),
            (self.id_separator.value.clone(), self.id_separator.source),
        );
        map.insert(
            "window_margin".to_string(),
            (self.window_margin.value.to_string(), self.window_margin.source),
        );
        map.insert(
            "raster_crs".to_string(),
            (self.raster_crs.value.to_string(), self.raster_crs.source),
        );
        map.insert(
            "validity_mode".to_string(),
            (format!("{:?}", self.validity_mode.value), self.validity_mode.source),
        );

        map
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    hazard_id_column: Option<String>,
    buffer_column: Option<String>,
    unit_id_column: Option<String>,
    id_separator: Option<String>,
    window_margin: Option<f64>,
    raster_crs: Option<String>,
    validity_mode: Option<String>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub hazard_id_column: Option<String>,
    pub buffer_column: Option<String>,
    pub unit_id_column: Option<String>,
    pub id_separator: Option<String>,
    pub window_margin: Option<f64>,
    pub raster_crs: Option<Crs>,
    pub validity_mode: Option<ValidityMode>,
}

/// Parse validity mode from string
pub fn parse_validity_mode(s: &str) -> Result<ValidityMode> {
    match s.to_lowercase().as_str() {
        "strict" => Ok(ValidityMode::Strict),
        "lenient" => Ok(ValidityMode::Lenient),
        _ => Err(ExposureError::ConfigInvalid {
            key: "validity_mode".to_string(),
            reason: format!("Invalid validity mode: {}. Use strict or lenient", s),
        }),
    }
}

/// Parse a bounding-window margin, which must be a finite non-negative number
pub fn parse_window_margin(s: &str) -> Result<f64> {
    let margin = s.trim().parse::<f64>().map_err(|_| ExposureError::ConfigInvalid {
        key: "window_margin".to_string(),
        reason: format!("Not a number: {}", s),
    })?;
    validate_window_margin(margin)
}

fn validate_window_margin(margin: f64) -> Result<f64> {
    if !margin.is_finite() || margin < 0.0 {
        return Err(ExposureError::ConfigInvalid {
            key: "window_margin".to_string(),
            reason: format!("Margin must be finite and non-negative, got {}", margin),
        });
    }

    Ok(margin)
}

pub fn parse_separator(s: &str) -> Result<String> {
    if s.is_empty() {
        return Err(ExposureError::ConfigInvalid {
            key: "id_separator".to_string(),
            reason: "Separator cannot be empty".to_string(),
        });
    }
    Ok(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = LayeredConfig::with_defaults();
        assert_eq!(config.hazard_id_column.value, "ID_climate_hazard");
        assert_eq!(config.hazard_id_column.source, ConfigSource::Default);
        assert_eq!(config.id_separator.value, "___");
        assert_eq!(config.raster_crs.value, Crs::mollweide());
        assert_eq!(config.validity_mode.value, ValidityMode::Strict);
    }

    #[test]
    fn test_config_precedence() {
        let mut value = ConfigValue::new(100, ConfigSource::Default);

        // File should override default
        value.update(200, ConfigSource::File);
        assert_eq!(value.value, 200);
        assert_eq!(value.source, ConfigSource::File);

        // Environment should override file
        value.update(300, ConfigSource::Environment);
        assert_eq!(value.value, 300);
        assert_eq!(value.source, ConfigSource::Environment);

        // CLI should override environment
        value.update(400, ConfigSource::Cli);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);

        // Lower precedence should not override
        value.update(500, ConfigSource::File);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
hazard_id_column = "fire_id"
buffer_column = "buffer_m"
window_margin = 0.25
raster_crs = "EPSG:4326"
validity_mode = "lenient"
"#
        )
        .unwrap();

        let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap();

        assert_eq!(config.hazard_id_column.value, "fire_id");
        assert_eq!(config.hazard_id_column.source, ConfigSource::File);
        assert_eq!(config.buffer_column.value, "buffer_m");
        assert_eq!(config.window_margin.value, 0.25);
        assert!(config.raster_crs.value.is_wgs84());
        assert_eq!(config.validity_mode.value, ValidityMode::Lenient);
        assert_eq!(config.unit_id_column.source, ConfigSource::Default);
    }

    #[test]
    fn test_load_from_file_rejects_negative_margin() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "window_margin = -1.0").unwrap();

        let result = LayeredConfig::with_defaults().load_from_file(file.path());
        assert!(matches!(result, Err(ExposureError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_missing_optional_file_is_ignored() {
        let config = LayeredConfig::with_defaults()
            .load_from_optional_file("/definitely/not/here/popexp.toml")
            .unwrap();
        assert_eq!(config.buffer_column.source, ConfigSource::Default);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = LayeredConfig::with_defaults();

        let overrides = CliConfigOverrides {
            id_separator: Some("|".to_string()),
            validity_mode: Some(ValidityMode::Lenient),
            ..Default::default()
        };

        config.update_from_cli(overrides);

        assert_eq!(config.id_separator.value, "|");
        assert_eq!(config.id_separator.source, ConfigSource::Cli);
        assert_eq!(config.validity_mode.value, ValidityMode::Lenient);
        // These should still be defaults
        assert_eq!(config.raster_crs.source, ConfigSource::Default);
        assert_eq!(config.window_margin.source, ConfigSource::Default);
    }

    #[test]
    fn test_parse_validity_mode() {
        assert_eq!(parse_validity_mode("strict").unwrap(), ValidityMode::Strict);
        assert_eq!(parse_validity_mode("LENIENT").unwrap(), ValidityMode::Lenient);
        assert!(parse_validity_mode("invalid").is_err());
    }

    #[test]
    fn test_parse_window_margin() {
        assert_eq!(parse_window_margin("0.5").unwrap(), 0.5);
        assert!(parse_window_margin("-0.1").is_err());
        assert!(parse_window_margin("NaN").is_err());
        assert!(parse_window_margin("wide").is_err());
    }

    #[test]
    fn test_inspection_map() {
        let config = LayeredConfig::with_defaults();
        let map = config.to_inspection_map();

        assert_eq!(map.len(), 7);
        let (crs_value, crs_source) = &map["raster_crs"];
        assert_eq!(crs_value, "ESRI:54009");
        assert_eq!(*crs_source, ConfigSource::Default);
    }
}
