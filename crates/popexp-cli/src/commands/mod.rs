//! Command implementations

mod config;
mod exposure;

use crate::cli::{Cli, Commands};
use crate::config_loader::load_config_with_overrides;
use crate::output::OutputWriter;
use anyhow::Result;

/// Execute a CLI command
pub fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);
    let config = load_config_with_overrides(cli.config.as_deref(), cli.config_overrides())?;

    match cli.command {
        Commands::Hazards(args) => exposure::hazards(args, &config, &output),
        Commands::ByUnit(args) => exposure::by_unit(args, &config, &output),
        Commands::Residents(args) => exposure::residents(args, &config, &output),
        Commands::Config => config::execute(&config, &output),
    }
}
