//! folderseed CLI Binary
//!
//! Command-line interface for replicating a template folder tree into a new
//! client workspace.

use clap::Parser;
use folderseed::logging::{init_logging, LoggingConfig};
use folderseed::tooling::cli::{Cli, CliContext};
use std::process;

/// Fold the logging flags over the `[logging]` section.
fn logging_config(cli: &Cli, base: &LoggingConfig) -> LoggingConfig {
    let mut config = base.clone();
    if cli.verbose {
        config.enabled = true;
        if config.output == "file" {
            config.output = "file+stderr".to_string();
        }
    }
    if let Some(level) = &cli.log_level {
        config.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        config.output = output.clone();
    }
    if let Some(file) = &cli.log_file {
        config.file = Some(file.clone());
    }
    config
}

fn main() {
    let cli = Cli::parse();

    // Create CLI context
    let context = match CliContext::new(cli.workspace.clone(), cli.config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    let logging = logging_config(&cli, &context.config().logging);
    if let Err(e) = init_logging(Some(&logging)) {
        eprintln!("Warning: {}", e);
    }

    // Execute command
    match context.execute(&cli.command) {
        Ok(output) => {
            println!("{}", output.text);
            if output.exit_code != 0 {
                process::exit(output.exit_code);
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
