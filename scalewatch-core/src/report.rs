//! Test case records
//!
//! Measurements are collected as structured [`Metric`]s and flattened into
//! `tier/metric` names only when a [`TestCaseRecord`] is created.

use crate::correlate::CorrelatedEvent;
use crate::error::{ReportError, SinkError};
use crate::load::LoadResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A reported measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    RequestCount,
    RequestedQps,
    ActualQps,
    ErrorsPercentage,
    /// Seconds from load start until the ready count went `from` -> `to`
    ScaleDelta { from: u32, to: u32 },
    /// Latency in milliseconds at a percentile
    LatencyPercentile(f64),
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::RequestCount => f.write_str("requestCount"),
            Metric::RequestedQps => f.write_str("requestedQPS"),
            Metric::ActualQps => f.write_str("actualQPS"),
            Metric::ErrorsPercentage => f.write_str("errorsPercentage"),
            Metric::ScaleDelta { from, to } => {
                write!(f, "scale-from-{:02}-to-{:02}(seconds)", from, to)
            }
            Metric::LatencyPercentile(p) if p.fract() == 0.0 => write!(f, "p{}(ms)", *p as u64),
            Metric::LatencyPercentile(p) => write!(f, "p{}(ms)", p),
        }
    }
}

/// One named value of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseRecord {
    /// `<tier>/<metric>`
    pub name: String,
    pub value: f32,
}

impl TestCaseRecord {
    pub fn new(tier: &str, metric: Metric, value: f64) -> Self {
        Self {
            name: format!("{}/{}", tier, metric),
            value: value as f32,
        }
    }

    pub fn tier(&self) -> &str {
        self.name
            .split_once('/')
            .map(|(tier, _)| tier)
            .unwrap_or_default()
    }

    pub fn metric(&self) -> &str {
        self.name
            .split_once('/')
            .map(|(_, metric)| metric)
            .unwrap_or(&self.name)
    }
}

/// Receives the finished records of a suite
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn publish(&self, suite: &str, records: &[TestCaseRecord]) -> Result<(), SinkError>;
}

/// Builds the records of one tier
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportBuilder;

impl ReportBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Fixed metrics first, then one record per scale event in log order,
    /// then latency percentiles in ascending order.
    pub fn build(
        &self,
        tier: &str,
        requested_qps: f64,
        result: &LoadResult,
        correlated: &[CorrelatedEvent],
    ) -> Result<Vec<TestCaseRecord>, ReportError> {
        if result.request_count == 0 {
            return Err(ReportError::EmptyResult {
                tier: tier.to_string(),
            });
        }

        let mut records = Vec::with_capacity(4 + correlated.len() + result.latency_percentiles.len());
        records.push(TestCaseRecord::new(
            tier,
            Metric::RequestCount,
            result.request_count as f64,
        ));
        records.push(TestCaseRecord::new(tier, Metric::RequestedQps, requested_qps));
        records.push(TestCaseRecord::new(tier, Metric::ActualQps, result.actual_qps));
        records.push(TestCaseRecord::new(
            tier,
            Metric::ErrorsPercentage,
            result.error_percentage,
        ));

        for correlated in correlated {
            let metric = Metric::ScaleDelta {
                from: correlated.event.old_scale,
                to: correlated.event.new_scale,
            };
            records.push(TestCaseRecord::new(tier, metric, correlated.elapsed_seconds()));
        }

        let mut percentiles = result.latency_percentiles.clone();
        percentiles.sort_by(|a, b| a.percentile.total_cmp(&b.percentile));
        for p in percentiles {
            records.push(TestCaseRecord::new(
                tier,
                Metric::LatencyPercentile(p.percentile),
                p.value_seconds * 1000.0,
            ));
        }

        Ok(records)
    }
}
