//! HTTP readiness probe

use crate::client::{build_client, parse_http_url};
use crate::config::HttpConfig;
use crate::errors::HttpError;
use async_trait::async_trait;
use reqwest::Client;
use scalewatch_core::{ProbeError, ReadinessProbe, TargetEndpoint};
use scalewatch_resilience::{RetryError, RetryExecutor, RetryPolicy};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Polls the endpoint's probe URL until it answers with a 2xx status.
///
/// Connection failures and non-2xx answers are retried with backoff until
/// the timeout passed to [`ReadinessProbe::wait_until_ready`] elapses.
#[derive(Debug, Clone)]
pub struct HttpReadinessProbe {
    client: Client,
    executor: RetryExecutor,
}

impl HttpReadinessProbe {
    pub fn new(client: Client) -> Self {
        Self::with_policy(client, RetryPolicy::readiness())
    }

    pub fn with_policy(client: Client, policy: RetryPolicy) -> Self {
        Self {
            client,
            executor: RetryExecutor::new(policy),
        }
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self, HttpError> {
        Ok(Self::new(build_client(config)?))
    }

    async fn probe_once(&self, endpoint: &TargetEndpoint, attempt: u32) -> Result<(), HttpError> {
        let mut request = self.client.get(&endpoint.probe_url);
        if let Some(host) = &endpoint.host_header {
            request = request.header(reqwest::header::HOST, host);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(
            "Readiness attempt {} against {}: {}",
            attempt, endpoint.probe_url, status
        );

        if status.is_success() {
            Ok(())
        } else {
            Err(HttpError::UnexpectedStatus {
                status: status.as_u16(),
                url: endpoint.probe_url.clone(),
            })
        }
    }
}

#[async_trait]
impl ReadinessProbe for HttpReadinessProbe {
    async fn wait_until_ready(
        &self,
        endpoint: &TargetEndpoint,
        timeout: Duration,
    ) -> Result<(), ProbeError> {
        parse_http_url(&endpoint.probe_url)
            .map_err(|e| ProbeError::InvalidEndpoint(e.to_string()))?;

        info!(
            "Waiting up to {:?} for {} to serve",
            timeout, endpoint.probe_url
        );
        let started = Instant::now();

        self.executor
            .execute_until(timeout, |attempt| self.probe_once(endpoint, attempt))
            .await
            .map_err(|e| match e {
                RetryError::DeadlineExceeded {
                    attempts,
                    waited,
                    last_error,
                } => ProbeError::Timeout {
                    url: endpoint.probe_url.clone(),
                    waited,
                    attempts,
                    last_error: last_error.map(|e| e.to_string()),
                },
                RetryError::MaxAttemptsExceeded {
                    attempts,
                    last_error,
                } => ProbeError::Timeout {
                    url: endpoint.probe_url.clone(),
                    waited: started.elapsed(),
                    attempts,
                    last_error: Some(last_error.to_string()),
                },
                RetryError::NonRetryableError(error) => ProbeError::Request(error.to_string()),
            })?;

        info!("{} is ready", endpoint.probe_url);
        Ok(())
    }
}
