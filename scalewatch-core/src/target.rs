//! The service under test: provisioning, teardown and readiness

use crate::error::{ProbeError, SetupError};
use crate::load::LoadTierConfig;
use async_trait::async_trait;
use std::time::Duration;

/// Where a provisioned target can be reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEndpoint {
    /// Name of the resource whose capacity is watched
    pub resource_name: String,
    /// URL polled until the target serves
    pub probe_url: String,
    /// Host header for ingresses that route on it
    pub host_header: Option<String>,
    /// Load URL replacing the one configured for the tier
    pub load_url: Option<String>,
}

impl TargetEndpoint {
    pub fn new(resource_name: impl Into<String>, probe_url: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
            probe_url: probe_url.into(),
            host_header: None,
            load_url: None,
        }
    }

    pub fn with_host_header(mut self, host: impl Into<String>) -> Self {
        self.host_header = Some(host.into());
        self
    }

    pub fn with_load_url(mut self, url: impl Into<String>) -> Self {
        self.load_url = Some(url.into());
        self
    }

    /// The tier configuration aimed at this endpoint
    pub fn apply_to(&self, tier: &LoadTierConfig) -> LoadTierConfig {
        let mut config = tier.clone();
        if let Some(url) = &self.load_url {
            config.target_url = url.clone();
        }
        if let Some(host) = &self.host_header {
            config
                .extra_headers
                .entry("Host".to_string())
                .or_insert_with(|| host.clone());
        }
        config
    }
}

/// Creates and removes the service under test
#[async_trait]
pub trait TargetProvisioner: Send + Sync {
    async fn provision(&self, tier: &LoadTierConfig) -> Result<TargetEndpoint, SetupError>;

    async fn teardown(&self, endpoint: &TargetEndpoint) -> Result<(), SetupError>;
}

/// Waits until the target serves
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn wait_until_ready(
        &self,
        endpoint: &TargetEndpoint,
        timeout: Duration,
    ) -> Result<(), ProbeError>;
}

/// A target that already exists. Provisioning hands out the same endpoint
/// every time and teardown does nothing.
#[derive(Debug, Clone)]
pub struct StaticTarget {
    endpoint: TargetEndpoint,
}

impl StaticTarget {
    pub fn new(endpoint: TargetEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl TargetProvisioner for StaticTarget {
    async fn provision(&self, _tier: &LoadTierConfig) -> Result<TargetEndpoint, SetupError> {
        Ok(self.endpoint.clone())
    }

    async fn teardown(&self, endpoint: &TargetEndpoint) -> Result<(), SetupError> {
        tracing::debug!("Leaving static target {} in place", endpoint.resource_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier() -> LoadTierConfig {
        LoadTierConfig::new(10, 10.0, Duration::from_secs(60), "http://10.0.0.1/?timeout=100")
    }

    #[test]
    fn test_apply_to_sets_host_and_url() {
        let endpoint = TargetEndpoint::new("autoscale-go", "http://10.0.0.1/?timeout=10")
            .with_host_header("autoscale-go.default.example.com")
            .with_load_url("http://10.0.0.2/?timeout=100");

        let config = endpoint.apply_to(&tier());
        assert_eq!(config.target_url, "http://10.0.0.2/?timeout=100");
        assert_eq!(
            config.extra_headers.get("Host").map(String::as_str),
            Some("autoscale-go.default.example.com")
        );
        assert_eq!(config.num_clients, 10);
    }

    #[test]
    fn test_apply_to_keeps_explicit_host_header() {
        let endpoint = TargetEndpoint::new("svc", "http://t/").with_host_header("a.example.com");
        let config = endpoint.apply_to(&tier().with_header("Host", "b.example.com"));
        assert_eq!(config.extra_headers["Host"], "b.example.com");
        assert_eq!(config.target_url, "http://10.0.0.1/?timeout=100");
    }

    #[tokio::test]
    async fn test_static_target() {
        let endpoint = TargetEndpoint::new("svc", "http://t/");
        let target = StaticTarget::new(endpoint.clone());
        assert_eq!(target.provision(&tier()).await.unwrap(), endpoint);
        assert!(target.teardown(&endpoint).await.is_ok());
    }
}
