//! Configuration loading utilities for CLI commands

use anyhow::{Context, Result};
use popexp_core::config::{CliConfigOverrides, LayeredConfig};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "popexp.toml";

/// Load defaults, the config file and the environment, in that order.
///
/// An explicit `config_path` must exist; the default file is optional.
pub fn load_config(config_path: Option<&Path>) -> Result<LayeredConfig> {
    let config = match config_path {
        Some(path) => LayeredConfig::with_defaults()
            .load_from_file(path)
            .with_context(|| format!("Failed to load configuration file {}", path.display()))?,
        None => LayeredConfig::with_defaults()
            .load_from_optional_file(default_config_path())
            .context("Failed to load configuration file")?,
    };

    Ok(config.load_from_env())
}

/// Load layered configuration with CLI overrides
pub fn load_config_with_overrides(
    config_path: Option<&Path>,
    overrides: CliConfigOverrides,
) -> Result<LayeredConfig> {
    let mut config = load_config(config_path)?;
    config.update_from_cli(overrides);
    Ok(config)
}

fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use popexp_core::config::ConfigSource;
    use std::io::Write;

    #[test]
    fn test_explicit_file_and_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "buffer_column = \"radius\"\nid_separator = \"+\"").unwrap();

        let overrides = CliConfigOverrides { id_separator: Some("|".to_string()), ..Default::default() };
        let config = load_config_with_overrides(Some(file.path()), overrides).unwrap();

        assert_eq!(config.buffer_column.value, "radius");
        assert_eq!(config.buffer_column.source, ConfigSource::File);
        assert_eq!(config.id_separator.value, "|");
        assert_eq!(config.id_separator.source, ConfigSource::Cli);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&temp_dir.path().join("absent.toml"))).is_err());
    }
}
