//! Configuration of the service under test

use crate::error::ConfigResult;
use crate::validation::{validate_http_url, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Service under test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Endpoint that receives the synthetic load (usually the ingress)
    pub url: String,

    /// Host header to send, for ingresses that route on it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_header: Option<String>,

    /// Path (and query) probed until the target serves
    pub readiness_path: String,

    /// How long to wait for the target to start serving
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub readiness_timeout: Duration,

    /// Processing delay the target simulates per request, in milliseconds
    pub processing_delay_ms: u64,

    /// Query parameter carrying the processing delay
    pub delay_query_param: String,

    /// Extra headers sent with every load request
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080/".to_string(),
            host_header: None,
            readiness_path: "/?timeout=10".to_string(),
            readiness_timeout: Duration::from_secs(300),
            processing_delay_ms: 100,
            delay_query_param: "timeout".to_string(),
            headers: BTreeMap::new(),
        }
    }
}

impl Validatable for TargetConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_http_url(&self.url, "url", self.domain_name())?;
        validate_required_string(&self.delay_query_param, "delay_query_param", self.domain_name())?;

        if !self.readiness_path.starts_with('/') {
            return Err(self.validation_error(format!(
                "readiness_path must start with '/', got '{}'",
                self.readiness_path
            )));
        }

        if self.readiness_timeout.is_zero() {
            return Err(self.validation_error("readiness_timeout must be greater than 0"));
        }

        if let Some(host) = &self.host_header {
            validate_required_string(host, "host_header", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "target"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_target_is_valid() {
        assert!(TargetConfig::default().validate().is_ok());
    }

    #[test]
    fn test_readiness_path_must_be_absolute() {
        let config = TargetConfig {
            readiness_path: "healthz".to_string(),
            ..TargetConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parses_headers_and_host() {
        let yaml = r#"
url: "http://10.0.0.5/"
host_header: "autoscale-go.default.example.com"
processing_delay_ms: 250
headers:
  X-Run: sweep
"#;
        let config: TargetConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.processing_delay_ms, 250);
        assert_eq!(config.headers.get("X-Run").map(String::as_str), Some("sweep"));
        assert_eq!(config.delay_query_param, "timeout");
        assert!(config.validate().is_ok());
    }
}
