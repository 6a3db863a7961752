//! `scalewatch validate-config` and `scalewatch generate-config`

use anyhow::{anyhow, Context, Result};
use colored::*;
use scalewatch_config::{ConfigLoader, ScaleWatchConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Handle configuration validation
pub fn handle_config_validate(config_file: Option<&PathBuf>) -> Result<()> {
    let config_file = config_file
        .ok_or_else(|| anyhow!("validate-config needs --config <PATH>"))?;
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    match ConfigLoader::new().from_file(config_file) {
        Ok(config) => {
            println!("{} Configuration file is valid", "✓".bright_green().bold());
            println!(
                "  {} tiers {:?} at {} QPS per client, {:?} each",
                config.suite.concurrent_clients.len(),
                config.suite.concurrent_clients,
                config.suite.qps_per_client,
                config.suite.iteration_duration
            );
            Ok(())
        }
        Err(e) => {
            println!(
                "{} Configuration validation failed: {}",
                "✗".bright_red().bold(),
                e
            );
            error!("Configuration validation failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handle configuration generation
pub fn handle_config_generate(output: Option<&Path>, force: bool) -> Result<()> {
    let sample = ScaleWatchConfig::generate_sample();

    let Some(output) = output else {
        print!("{}", sample);
        return Ok(());
    };

    if output.exists() && !force {
        return Err(anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    fs::write(output, sample)
        .with_context(|| format!("Failed to write configuration to {:?}", output))?;

    println!(
        "{} Sample configuration written to {:?}",
        "✓".bright_green().bold(),
        output
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generated_config_validates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("configs/scalewatch.yaml");

        handle_config_generate(Some(&path), false).unwrap();
        handle_config_validate(Some(&path)).unwrap();

        // refuses to overwrite without --force
        assert!(handle_config_generate(Some(&path), false).is_err());
        assert!(handle_config_generate(Some(&path), true).is_ok());
    }

    #[test]
    fn test_validate_requires_path() {
        assert!(handle_config_validate(None).is_err());
        assert!(handle_config_validate(Some(&PathBuf::from("/nonexistent/scale.yaml"))).is_err());
    }

    #[test]
    fn test_invalid_file_fails_validation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "suite:\n  concurrent_clients: []\n").unwrap();
        assert!(handle_config_validate(Some(&path)).is_err());
    }
}
