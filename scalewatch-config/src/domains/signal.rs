//! Capacity signal configuration

use crate::error::ConfigResult;
use crate::validation::{validate_http_url, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the ready-capacity of the service under test is observed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// JSON endpoint reporting ready counts per resource. Without it no
    /// scale events are recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Only resources whose name contains this string are watched
    pub resource_name: String,

    /// Interval between polls of the signal endpoint
    #[serde(with = "crate::domains::utils::serde_duration_ms")]
    pub poll_interval_ms: Duration,

    /// Consecutive failed polls tolerated before the watcher gives up
    pub max_consecutive_failures: u32,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            url: None,
            resource_name: "scalewatch-target".to_string(),
            poll_interval_ms: Duration::from_millis(500),
            max_consecutive_failures: 5,
        }
    }
}

impl Validatable for SignalConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(url) = &self.url {
            validate_http_url(url, "url", self.domain_name())?;
        }
        validate_required_string(&self.resource_name, "resource_name", self.domain_name())?;

        if self.poll_interval_ms < Duration::from_millis(10) {
            return Err(self.validation_error("poll_interval_ms must be at least 10"));
        }

        if self.max_consecutive_failures == 0 {
            return Err(self.validation_error("max_consecutive_failures must be greater than 0"));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "signal"
    }
}
