//! Domain-specific configuration modules

pub mod http;
pub mod logging;
pub mod output;
pub mod signal;
pub mod suite;
pub mod target;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main scalewatch configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScaleWatchConfig {
    /// Tier sweep configuration
    #[serde(default)]
    pub suite: suite::SuiteConfig,

    /// Service under test
    #[serde(default)]
    pub target: target::TargetConfig,

    /// Capacity signal
    #[serde(default)]
    pub signal: signal::SignalConfig,

    /// HTTP client configuration
    #[serde(default)]
    pub http: http::HttpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,

    /// Report output configuration
    #[serde(default)]
    pub output: output::OutputConfig,
}

impl ScaleWatchConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.suite.validate()?;
        self.target.validate()?;
        self.signal.validate()?;
        self.http.validate()?;
        self.logging.validate()?;
        self.output.validate()?;

        if self.target.readiness_timeout < self.http.timeout {
            log::warn!(
                "target.readiness_timeout ({:?}) is shorter than http.timeout ({:?}); a single slow probe can exhaust it",
                self.target.readiness_timeout,
                self.http.timeout
            );
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = ScaleWatchConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
