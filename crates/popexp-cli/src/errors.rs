use console::style;
use popexp_core::ExposureError;
use std::fmt;
use std::path::Path;

/// Enhanced error type with suggestions
pub struct CliError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
    pub help_command: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
            help_command: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, command: impl Into<String>) -> Self {
        self.help_command = Some(command.into());
        self
    }

    pub fn display(&self) {
        eprintln!("{} {}\n", style("✗").red().bold(), style(&self.message).red().bold());

        if let Some(ref context) = self.context {
            eprintln!("{}", context);
            eprintln!();
        }

        if !self.suggestions.is_empty() {
            eprintln!("{}", style("To fix this:").yellow().bold());
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, suggestion);
            }
            eprintln!();
        }

        if let Some(ref help_cmd) = self.help_command {
            eprintln!("{} {}", style("Need help?").cyan(), style(help_cmd).cyan().bold());
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Create error for a missing input file
pub fn input_not_found(kind: &str, path: &Path) -> CliError {
    CliError::new(format!("{} file not found", kind))
        .with_context(format!("The specified file does not exist.\n\nPath: {}", path.display()))
        .with_suggestion("Check the file path and try again")
        .with_suggestion("Use absolute path or path relative to current directory")
        .with_help("Run: popexp --help")
}

fn exposure_error(error: &ExposureError) -> CliError {
    let base = CliError::new(error.to_string());
    match error {
        ExposureError::UnsupportedFileFormat { .. } => base
            .with_suggestion("Vector inputs must be GeoJSON (.geojson, .json) or GeoParquet (.parquet, .geoparquet)")
            .with_suggestion("Population rasters must be single-band GeoTIFF files"),
        ExposureError::MissingGeometryColumn { .. } => {
            base.with_suggestion("Make sure the dataset stores its geometries in a geometry column")
        }
        ExposureError::MissingRequiredAttribute { attribute, .. } => base
            .with_suggestion(format!("Add the '{}' attribute to every feature", attribute))
            .with_suggestion("Or point popexp at another column: --hazard-id-column, --buffer-column, --unit-id-column"),
        ExposureError::DuplicateIdentifier { .. } => {
            base.with_suggestion("Give every feature a distinct identifier")
        }
        ExposureError::InvalidCoordinate { .. }
        | ExposureError::InvalidBufferDistance { .. }
        | ExposureError::GeometryRepairFailure { .. } => base
            .with_suggestion("Fix or remove the offending feature")
            .with_suggestion("Or skip invalid features: --validity-mode lenient"),
        ExposureError::Projection { .. } => base
            .with_suggestion("Check the CRS declared by the input files")
            .with_suggestion("Set the raster CRS explicitly: --raster-crs ESRI:54009"),
        ExposureError::ConfigInvalid { .. } => base
            .with_suggestion("Check popexp.toml and POPEXP_* environment variables")
            .with_help("Run: popexp config"),
        _ => base,
    }
}

/// Convert anyhow::Error to CliError with context
pub fn from_anyhow(error: anyhow::Error) -> CliError {
    let error = match error.downcast::<CliError>() {
        Ok(cli_error) => return cli_error,
        Err(error) => error,
    };

    if let Some(exposure) = error.chain().find_map(|e| e.downcast_ref::<ExposureError>()) {
        let cli_error = exposure_error(exposure);
        return match error.chain().next() {
            Some(outer) if outer.to_string() != exposure.to_string() => cli_error.with_context(outer.to_string()),
            _ => cli_error,
        };
    }

    let message = error.to_string();
    if message.contains("No such file or directory") {
        CliError::new("File not found")
            .with_context(format!("Error: {}", message))
            .with_suggestion("Check the file path and try again")
    } else if message.to_lowercase().contains("permission denied") {
        CliError::new("Permission denied")
            .with_context(format!("Error: {}", message))
            .with_suggestion("Check file permissions")
            .with_suggestion("Or run with appropriate privileges")
    } else {
        CliError::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exposure_error_gets_suggestions() {
        let error: anyhow::Result<()> = Err(ExposureError::InvalidBufferDistance {
            feature_id: "fire-3".to_string(),
            distance: -1.0,
        }
        .into());

        let cli_error = from_anyhow(error.context("Hazard exposure failed").unwrap_err());

        assert!(cli_error.message.contains("fire-3"));
        assert_eq!(cli_error.context.as_deref(), Some("Hazard exposure failed"));
        assert!(cli_error.suggestions.iter().any(|s| s.contains("lenient")));
    }

    #[test]
    fn test_cli_error_passes_through() {
        let error = anyhow::Error::from(input_not_found("Raster", Path::new("missing.tif")));
        let cli_error = from_anyhow(error);
        assert_eq!(cli_error.message, "Raster file not found");
        assert!(cli_error.help_command.is_some());
    }
}
