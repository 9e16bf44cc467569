//! popexp CLI - Command-line interface
//!
//! Runs the population exposure workflows on files from disk.

mod cli;
mod commands;
mod config_loader;
mod errors;
mod output;
mod output_types;
mod progress;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize tracing; stdout is reserved for results
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();
    let json = cli.json;

    // Execute the command
    if let Err(error) = commands::execute(cli) {
        let error = errors::from_anyhow(error);
        if json {
            output::OutputWriter::new(true).error(&error);
        } else {
            error.display();
        }
        std::process::exit(1);
    }
}
