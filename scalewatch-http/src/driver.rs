//! HTTP load driver
//!
//! Each tier runs `num_clients` workers on the shared client. A worker
//! issues a request every `1 / qps_per_client` seconds without waiting for
//! the previous one to finish, so slow responses do not lower the offered
//! rate. Worker start times are staggered across the first period.

use crate::client::{build_client, header_map, with_query_param};
use crate::config::HttpConfig;
use crate::errors::HttpError;
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::header::HeaderMap;
use reqwest::Client;
use scalewatch_core::{LatencyHistogram, LoadDriver, LoadError, LoadSamples, LoadTierConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Shortest pacing period; rates above this are capped
const MIN_PERIOD: Duration = Duration::from_micros(100);

/// Load driver issuing GET requests with reqwest
#[derive(Debug, Clone)]
pub struct HttpLoadDriver {
    client: Client,
    processing_delay: Option<(String, u64)>,
}

impl HttpLoadDriver {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            processing_delay: None,
        }
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self, HttpError> {
        Ok(Self::new(build_client(config)?))
    }

    /// Ask the target to spend `millis` on every request, passed as the
    /// query parameter `param`
    pub fn with_processing_delay(mut self, param: impl Into<String>, millis: u64) -> Self {
        self.processing_delay = Some((param.into(), millis));
        self
    }

    fn request_url(&self, config: &LoadTierConfig) -> Result<String, LoadError> {
        match &self.processing_delay {
            Some((param, millis)) => {
                with_query_param(&config.target_url, param, &millis.to_string())
                    .map_err(|e| LoadError::InvalidConfig(e.to_string()))
            }
            None => Ok(config.target_url.clone()),
        }
    }

    /// One request before the workers start, so an unreachable target fails
    /// the tier immediately instead of producing a run of errors
    async fn preflight(&self, url: &str, headers: &HeaderMap) -> Result<(), LoadError> {
        debug!("Preflight request to {}", url);
        match self.client.get(url).headers(headers.clone()).send().await {
            Ok(response) => {
                if !response.status().is_success() {
                    warn!(
                        "Preflight request to {} returned {}; starting load anyway",
                        url,
                        response.status()
                    );
                }
                Ok(())
            }
            Err(e) => {
                let error = HttpError::from(e);
                if error.is_connect_failure() {
                    Err(LoadError::Unreachable {
                        url: url.to_string(),
                        reason: error.to_string(),
                    })
                } else {
                    Err(LoadError::Driver(error.to_string()))
                }
            }
        }
    }
}

#[async_trait]
impl LoadDriver for HttpLoadDriver {
    async fn run_load(&self, config: &LoadTierConfig) -> Result<LoadSamples, LoadError> {
        config.validate()?;

        let url = self.request_url(config)?;
        let headers = header_map(&config.extra_headers)
            .map_err(|e| LoadError::InvalidConfig(e.to_string()))?;

        self.preflight(&url, &headers).await?;

        let period = Duration::try_from_secs_f64(1.0 / config.qps_per_client)
            .map_err(|e| LoadError::InvalidConfig(format!("qps_per_client: {}", e)))?
            .max(MIN_PERIOD);
        let target = Arc::new(RequestTarget {
            client: self.client.clone(),
            url,
            headers,
        });

        info!(
            "Starting {} clients at {} QPS each against {} for {:?}",
            config.num_clients, config.qps_per_client, target.url, config.duration
        );

        let start_time = Utc::now();
        let started = Instant::now();
        let deadline = started + config.duration;

        let mut workers = JoinSet::new();
        for client in 0..config.num_clients {
            let offset = period.mul_f64(f64::from(client) / f64::from(config.num_clients));
            workers.spawn(run_client(
                Arc::clone(&target),
                period,
                started + offset,
                deadline,
            ));
        }

        let mut histogram = LatencyHistogram::new()?;
        let mut total = 0;
        let mut errors = 0;
        while let Some(joined) = workers.join_next().await {
            let tally =
                joined.map_err(|e| LoadError::Driver(format!("Load worker failed: {}", e)))??;
            histogram.merge(&tally.histogram)?;
            total += tally.total;
            errors += tally.errors;
        }

        let elapsed = started.elapsed();
        debug!(
            "Load run finished: {} requests, {} errors in {:?}",
            total, errors, elapsed
        );

        Ok(LoadSamples {
            start_time,
            elapsed,
            histogram,
            total,
            errors,
        })
    }
}

struct RequestTarget {
    client: Client,
    url: String,
    headers: HeaderMap,
}

impl RequestTarget {
    /// Issue one request; returns its latency and whether it succeeded
    async fn issue(&self) -> (Duration, bool) {
        let started = Instant::now();
        let result = self
            .client
            .get(&self.url)
            .headers(self.headers.clone())
            .send()
            .await;

        let success = match result {
            Ok(response) => {
                let status = response.status();
                // read the body so the connection goes back to the pool
                let body = response.bytes().await;
                status.is_success() && body.is_ok()
            }
            Err(e) => {
                debug!("Request to {} failed: {}", self.url, e);
                false
            }
        };
        (started.elapsed(), success)
    }
}

struct ClientTally {
    histogram: LatencyHistogram,
    total: u64,
    errors: u64,
}

async fn run_client(
    target: Arc<RequestTarget>,
    period: Duration,
    first_tick: Instant,
    deadline: Instant,
) -> Result<ClientTally, LoadError> {
    let mut tally = ClientTally {
        histogram: LatencyHistogram::new()?,
        total: 0,
        errors: 0,
    };

    let mut ticker = interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight = FuturesUnordered::new();

    loop {
        tokio::select! {
            tick = ticker.tick() => {
                if tick >= deadline {
                    break;
                }
                let target = Arc::clone(&target);
                in_flight.push(async move { target.issue().await });
            }
            Some((latency, success)) = in_flight.next(), if !in_flight.is_empty() => {
                tally.record(latency, success);
            }
        }
    }

    while let Some((latency, success)) = in_flight.next().await {
        tally.record(latency, success);
    }
    Ok(tally)
}

impl ClientTally {
    fn record(&mut self, latency: Duration, success: bool) {
        self.histogram.record(latency);
        self.total += 1;
        if !success {
            self.errors += 1;
        }
    }
}
