//! Tier sweep configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_range, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// What the suite does when a tier fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicyConfig {
    /// Stop the sweep at the first failing tier
    #[default]
    Abort,
    /// Record the failure and continue with the next tier
    SkipTier,
}

impl FromStr for FailurePolicyConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "abort" => Ok(FailurePolicyConfig::Abort),
            "skip_tier" | "skip" => Ok(FailurePolicyConfig::SkipTier),
            _ => Err(format!("Invalid failure policy: {}", s)),
        }
    }
}

/// Configuration of the concurrency sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Label under which the report is published
    pub name: String,

    /// Client counts, one tier each, run in order
    pub concurrent_clients: Vec<u32>,

    /// Requests per second issued by each client
    pub qps_per_client: f64,

    /// How long each tier drives load
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub iteration_duration: Duration,

    /// Per-replica concurrency the autoscaler aims for. Only used to size
    /// the expected number of scale events.
    pub target_concurrency: u32,

    /// Latency percentiles to report
    pub percentiles: Vec<f64>,

    /// Behaviour when a tier fails
    pub failure_policy: FailurePolicyConfig,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            name: "scale-by-load".to_string(),
            concurrent_clients: vec![10, 20, 40, 80, 160, 320],
            qps_per_client: 10.0,
            iteration_duration: Duration::from_secs(60),
            target_concurrency: 10,
            percentiles: vec![50.0, 75.0, 90.0, 99.0, 99.9],
            failure_policy: FailurePolicyConfig::Abort,
        }
    }
}

impl Validatable for SuiteConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.name, "name", self.domain_name())?;

        if self.concurrent_clients.is_empty() {
            return Err(self.validation_error("concurrent_clients must list at least one tier"));
        }
        for clients in &self.concurrent_clients {
            validate_positive(*clients, "concurrent_clients", self.domain_name())?;
        }
        if self.concurrent_clients.windows(2).any(|w| w[0] >= w[1]) {
            log::warn!(
                "concurrent_clients {:?} is not strictly increasing; report consumers expect an ascending sweep",
                self.concurrent_clients
            );
        }

        validate_positive(self.qps_per_client, "qps_per_client", self.domain_name())?;
        validate_positive(
            self.iteration_duration.as_secs(),
            "iteration_duration",
            self.domain_name(),
        )?;
        validate_positive(self.target_concurrency, "target_concurrency", self.domain_name())?;

        for percentile in &self.percentiles {
            validate_range(*percentile, 0.0, 100.0, "percentiles", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "suite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_reference_sweep() {
        let config = SuiteConfig::default();
        assert_eq!(config.concurrent_clients, vec![10, 20, 40, 80, 160, 320]);
        assert_eq!(config.qps_per_client, 10.0);
        assert_eq!(config.iteration_duration, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_and_zero_tiers() {
        let mut config = SuiteConfig::default();
        config.concurrent_clients.clear();
        assert!(config.validate().is_err());

        config.concurrent_clients = vec![10, 0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_percentile() {
        let config = SuiteConfig {
            percentiles: vec![50.0, 120.0],
            ..SuiteConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_failure_policy_from_str() {
        assert_eq!(
            FailurePolicyConfig::from_str("skip-tier").unwrap(),
            FailurePolicyConfig::SkipTier
        );
        assert_eq!(
            FailurePolicyConfig::from_str("ABORT").unwrap(),
            FailurePolicyConfig::Abort
        );
        assert!(FailurePolicyConfig::from_str("retry").is_err());
    }
}
