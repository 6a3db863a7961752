//! Load tiers
//!
//! A [`LoadDriver`] issues the requests of one tier and hands back raw
//! samples. [`LoadTierRunner`] turns those into a [`LoadResult`]: request
//! count, achieved throughput, error rate and latency percentiles.

use crate::error::LoadError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hdrhistogram::Histogram;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Percentiles reported when none are configured
pub const DEFAULT_PERCENTILES: [f64; 5] = [50.0, 75.0, 90.0, 99.0, 99.9];

/// Longest latency the histogram tracks; slower requests are clamped
const MAX_TRACKED_LATENCY_MICROS: u64 = 3_600_000_000;

/// One concurrency level of the sweep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadTierConfig {
    pub num_clients: u32,
    /// Requests per second issued by each client
    pub qps_per_client: f64,
    pub duration: Duration,
    pub target_url: String,
    pub extra_headers: BTreeMap<String, String>,
}

impl LoadTierConfig {
    pub fn new(
        num_clients: u32,
        qps_per_client: f64,
        duration: Duration,
        target_url: impl Into<String>,
    ) -> Self {
        Self {
            num_clients,
            qps_per_client,
            duration,
            target_url: target_url.into(),
            extra_headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    /// Name of the tier, used as the prefix of its records
    pub fn label(&self) -> String {
        format!("clients-{:03}", self.num_clients)
    }

    /// Aggregate request rate across all clients
    pub fn requested_qps(&self) -> f64 {
        f64::from(self.num_clients) * self.qps_per_client
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        if self.num_clients == 0 {
            return Err(LoadError::InvalidConfig(
                "num_clients must be greater than 0".to_string(),
            ));
        }
        if !self.qps_per_client.is_finite() || self.qps_per_client <= 0.0 {
            return Err(LoadError::InvalidConfig(format!(
                "qps_per_client must be a positive number, got {}",
                self.qps_per_client
            )));
        }
        if self.duration.is_zero() {
            return Err(LoadError::InvalidConfig(
                "duration must be greater than 0".to_string(),
            ));
        }
        if self.target_url.trim().is_empty() {
            return Err(LoadError::InvalidConfig(
                "target_url cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Latency histogram with microsecond resolution
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    inner: Histogram<u64>,
}

impl LatencyHistogram {
    pub fn new() -> Result<Self, LoadError> {
        let inner = Histogram::new_with_bounds(1, MAX_TRACKED_LATENCY_MICROS, 3)
            .map_err(|e| LoadError::Histogram(e.to_string()))?;
        Ok(Self { inner })
    }

    pub fn record(&mut self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.inner.saturating_record(micros.max(1));
    }

    pub fn merge(&mut self, other: &LatencyHistogram) -> Result<(), LoadError> {
        self.inner
            .add(&other.inner)
            .map_err(|e| LoadError::Histogram(e.to_string()))
    }

    pub fn len(&self) -> u64 {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Latency at `percentile` (0 to 100)
    pub fn value_at_percentile(&self, percentile: f64) -> Duration {
        let quantile = (percentile / 100.0).clamp(0.0, 1.0);
        Duration::from_micros(self.inner.value_at_quantile(quantile))
    }
}

/// Raw output of a load run
#[derive(Debug, Clone)]
pub struct LoadSamples {
    /// When the first request was issued
    pub start_time: DateTime<Utc>,
    pub elapsed: Duration,
    /// Latencies of all completed requests, failed ones included
    pub histogram: LatencyHistogram,
    pub total: u64,
    pub errors: u64,
}

/// Latency at one percentile
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentileValue {
    pub percentile: f64,
    pub value_seconds: f64,
}

/// Summary of one tier's load run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadResult {
    pub request_count: u64,
    pub actual_qps: f64,
    pub error_percentage: f64,
    pub start_time: DateTime<Utc>,
    pub elapsed: Duration,
    /// Ascending by percentile
    pub latency_percentiles: Vec<PercentileValue>,
}

/// Issues the requests of a tier
#[async_trait]
pub trait LoadDriver: Send + Sync {
    /// Run load for `config.duration`. Must fail fast when requests cannot
    /// be issued at all.
    async fn run_load(&self, config: &LoadTierConfig) -> Result<LoadSamples, LoadError>;
}

/// Runs one tier through a [`LoadDriver`] and summarizes the samples
#[derive(Clone)]
pub struct LoadTierRunner {
    driver: Arc<dyn LoadDriver>,
    percentiles: Vec<f64>,
}

impl LoadTierRunner {
    pub fn new(driver: Arc<dyn LoadDriver>) -> Self {
        Self {
            driver,
            percentiles: DEFAULT_PERCENTILES.to_vec(),
        }
    }

    /// Replace the reported percentiles. Values outside 0 to 100 are
    /// dropped; the rest are sorted and deduplicated.
    pub fn with_percentiles(mut self, percentiles: impl IntoIterator<Item = f64>) -> Self {
        let mut accepted: Vec<f64> = percentiles
            .into_iter()
            .filter(|p| {
                let valid = p.is_finite() && (0.0..=100.0).contains(p);
                if !valid {
                    warn!("Ignoring invalid percentile {}", p);
                }
                valid
            })
            .collect();
        accepted.sort_by(f64::total_cmp);
        accepted.dedup();
        self.percentiles = accepted;
        self
    }

    pub fn percentiles(&self) -> &[f64] {
        &self.percentiles
    }

    pub async fn run(&self, config: &LoadTierConfig) -> Result<LoadResult, LoadError> {
        config.validate()?;

        info!(
            "Starting {} with {} clients at {} qps each for {:?}",
            config.label(),
            config.num_clients,
            config.qps_per_client,
            config.duration
        );
        let samples = self.driver.run_load(config).await?;
        let result = self.summarize(&samples);

        info!(
            "{} finished: {} requests, {:.1} qps, {:.2}% errors",
            config.label(),
            result.request_count,
            result.actual_qps,
            result.error_percentage
        );
        Ok(result)
    }

    /// Reduce raw samples to a result
    pub fn summarize(&self, samples: &LoadSamples) -> LoadResult {
        let elapsed_secs = samples.elapsed.as_secs_f64();
        let actual_qps = if elapsed_secs > 0.0 {
            samples.total as f64 / elapsed_secs
        } else {
            0.0
        };

        let error_percentage = if samples.total == 0 {
            0.0
        } else {
            (samples.errors as f64 / samples.total as f64 * 100.0).clamp(0.0, 100.0)
        };

        let latency_percentiles = if samples.histogram.is_empty() {
            debug!("No latencies recorded, skipping percentiles");
            Vec::new()
        } else {
            self.percentiles
                .iter()
                .map(|&percentile| PercentileValue {
                    percentile,
                    value_seconds: samples
                        .histogram
                        .value_at_percentile(percentile)
                        .as_secs_f64(),
                })
                .collect()
        };

        LoadResult {
            request_count: samples.total,
            actual_qps,
            error_percentage,
            start_time: samples.start_time,
            elapsed: samples.elapsed,
            latency_percentiles,
        }
    }
}

impl std::fmt::Debug for LoadTierRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadTierRunner")
            .field("percentiles", &self.percentiles)
            .finish()
    }
}
