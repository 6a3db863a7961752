//! Configuration loading and environment variable handling

use crate::domains::ScaleWatchConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "SCALEWATCH".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<ScaleWatchConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: ScaleWatchConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<ScaleWatchConfig> {
        let mut config = ScaleWatchConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<ScaleWatchConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn apply_env_overrides(&self, config: &mut ScaleWatchConfig) -> ConfigResult<()> {
        self.apply_suite_overrides(&mut config.suite)?;
        self.apply_target_overrides(&mut config.target)?;
        self.apply_signal_overrides(&mut config.signal)?;
        self.apply_http_overrides(&mut config.http)?;
        self.apply_logging_overrides(&mut config.logging)?;
        self.apply_output_overrides(&mut config.output)?;
        Ok(())
    }

    fn apply_suite_overrides(
        &self,
        config: &mut crate::domains::suite::SuiteConfig,
    ) -> ConfigResult<()> {
        if let Ok(tiers) = self.get_env_var("TIERS") {
            config.concurrent_clients = parse_tiers(&tiers)
                .map_err(|e| ConfigError::EnvError(format!("Invalid TIERS: {}", e)))?;
        }

        if let Ok(qps) = self.get_env_var("QPS_PER_CLIENT") {
            config.qps_per_client = qps
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid QPS_PER_CLIENT: {}", e)))?;
        }

        if let Ok(seconds) = self.get_env_var("ITERATION_SECONDS") {
            let seconds: u64 = seconds.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid ITERATION_SECONDS: {}", e))
            })?;
            config.iteration_duration = Duration::from_secs(seconds);
        }

        if let Ok(policy) = self.get_env_var("FAILURE_POLICY") {
            config.failure_policy = crate::domains::suite::FailurePolicyConfig::from_str(&policy)
                .map_err(|_| ConfigError::EnvError(format!("Invalid FAILURE_POLICY: {}", policy)))?;
        }

        Ok(())
    }

    fn apply_target_overrides(
        &self,
        config: &mut crate::domains::target::TargetConfig,
    ) -> ConfigResult<()> {
        if let Ok(url) = self.get_env_var("TARGET_URL") {
            config.url = url;
        }

        if let Ok(host) = self.get_env_var("TARGET_HOST") {
            config.host_header = Some(host);
        }

        if let Ok(delay) = self.get_env_var("PROCESSING_DELAY_MS") {
            config.processing_delay_ms = delay.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid PROCESSING_DELAY_MS: {}", e))
            })?;
        }

        Ok(())
    }

    fn apply_signal_overrides(
        &self,
        config: &mut crate::domains::signal::SignalConfig,
    ) -> ConfigResult<()> {
        if let Ok(url) = self.get_env_var("SIGNAL_URL") {
            config.url = Some(url);
        }

        if let Ok(name) = self.get_env_var("RESOURCE_NAME") {
            config.resource_name = name;
        }

        Ok(())
    }

    fn apply_http_overrides(
        &self,
        config: &mut crate::domains::http::HttpConfig,
    ) -> ConfigResult<()> {
        if let Ok(timeout) = self.get_env_var("HTTP_TIMEOUT") {
            let seconds: u64 = timeout
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid HTTP_TIMEOUT: {}", e)))?;
            config.timeout = Duration::from_secs(seconds);
        }

        if let Ok(verify_ssl) = self.get_env_var("HTTP_VERIFY_SSL") {
            config.verify_ssl = verify_ssl
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid HTTP_VERIFY_SSL: {}", e)))?;
        }

        Ok(())
    }

    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    fn apply_output_overrides(
        &self,
        config: &mut crate::domains::output::OutputConfig,
    ) -> ConfigResult<()> {
        if let Ok(dir) = self.get_env_var("OUTPUT_DIR") {
            config.directory = PathBuf::from(dir);
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a comma separated list of client counts, e.g. `10,20,40`
pub fn parse_tiers(value: &str) -> Result<Vec<u32>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>()
                .map_err(|e| format!("'{}' is not a client count: {}", part, e))
        })
        .collect::<Result<Vec<_>, _>>()
        .and_then(|tiers| {
            if tiers.is_empty() {
                Err("no tiers given".to_string())
            } else {
                Ok(tiers)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tiers() {
        assert_eq!(parse_tiers("10, 20,40").unwrap(), vec![10, 20, 40]);
        assert_eq!(parse_tiers("5,").unwrap(), vec![5]);
        assert!(parse_tiers("").is_err());
        assert!(parse_tiers("10,abc").is_err());
    }
}
