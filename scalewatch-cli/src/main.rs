use anyhow::{Context, Result};
use clap::Parser;
use scalewatch_config::{ConfigLoader, LogLevel, ScaleWatchConfig};
use scalewatch_logging::{init_logging_from_config, init_simple_tracing};
use std::path::PathBuf;
use tracing::{debug, info, warn};

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::config::{handle_config_generate, handle_config_validate};
use commands::run::{apply_overrides, run_command, RunOverrides};

/// Load configuration from file or use defaults
fn load_config(config_path: Option<&PathBuf>) -> Result<ScaleWatchConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => {
            info!("Loading configuration from: {:?}", path);
            loader
                .from_file(path)
                .with_context(|| format!("Failed to load configuration from {:?}", path))
        }
        None => {
            debug!("No configuration file specified. Loading from environment or defaults.");
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
    }
}

/// Initialize logging from configuration, with the CLI level taking
/// precedence
fn init_logging(config: &ScaleWatchConfig, log_level: Option<&String>) -> Result<()> {
    let mut logging_config = config.logging.clone();
    if let Some(level_str) = log_level {
        match level_str.parse::<LogLevel>() {
            Ok(level) => logging_config.level = level,
            Err(e) => eprintln!("{}, keeping '{}'", e, logging_config.level),
        }
    }

    if let Err(e) = init_logging_from_config(&logging_config) {
        eprintln!(
            "Failed to initialize structured logging: {}, falling back to simple tracing",
            e
        );
        init_simple_tracing(logging_config.level.as_str())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Run {
            tiers,
            target,
            duration,
            dry_run,
        }) => {
            let mut config = load_config(cli.config.as_ref())?;
            init_logging(&config, cli.log_level.as_ref())?;
            info!("Scalewatch {} starting", env!("CARGO_PKG_VERSION"));

            apply_overrides(
                &mut config,
                &RunOverrides {
                    tiers: tiers.clone(),
                    target: target.clone(),
                    duration: *duration,
                },
            )?;
            if *dry_run && config.suite.iteration_duration.as_secs() > 10 {
                warn!(
                    "Dry run still waits {:?} per tier; pass --duration to shorten it",
                    config.suite.iteration_duration
                );
            }
            run_command(config, *dry_run).await
        }
        Some(Commands::ValidateConfig) => {
            init_simple_tracing(cli.log_level.as_deref().unwrap_or("warn"))?;
            handle_config_validate(cli.config.as_ref())
        }
        Some(Commands::GenerateConfig { output, force }) => {
            handle_config_generate(output.as_deref(), *force)
        }
        None => {
            // If no subcommand is provided, print help
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().context("Failed to print help")?;
            println!();
            Ok(())
        }
    }
}
