//! Error taxonomy of the harness
//!
//! Every collaborator has its own error type. A failing tier wraps the
//! collaborator error in [`TierError`], which names the tier and the phase
//! it failed in.

use crate::report::TestCaseRecord;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failures of the capacity signal subscription
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("Failed to subscribe to capacity signal: {0}")]
    Subscribe(String),

    #[error("Capacity signal stream error: {0}")]
    Stream(String),

    #[error("Capacity signal stream disconnected after {notifications} notifications")]
    Disconnected { notifications: u64 },

    #[error("Watcher task failed: {0}")]
    TaskFailed(String),
}

/// Failures of the load run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("Target {url} is unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Invalid load configuration: {0}")]
    InvalidConfig(String),

    #[error("Load driver failed: {0}")]
    Driver(String),

    #[error("Latency histogram error: {0}")]
    Histogram(String),
}

/// Failures while turning a load result into records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("Tier {tier} produced no samples")]
    EmptyResult { tier: String },
}

/// Failures of the readiness probe
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Endpoint {url} not ready after {waited:?} ({attempts} attempts){}", .last_error.as_ref().map(|e| format!(": {}", e)).unwrap_or_default())]
    Timeout {
        url: String,
        waited: Duration,
        attempts: u32,
        last_error: Option<String>,
    },

    #[error("Invalid probe endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Probe request failed: {0}")]
    Request(String),
}

/// Failures creating or removing the service under test
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("Failed to provision target: {0}")]
    Provision(String),

    #[error("Failed to tear down target: {0}")]
    Teardown(String),
}

/// Failures publishing a report
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to format report: {0}")]
    Format(String),

    #[error("Failed to deliver report to {sink}: {message}")]
    Delivery { sink: String, message: String },
}

/// Any collaborator failure that can end a tier
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HarnessError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Phase of a tier in which a failure occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierPhase {
    /// Provisioning and readiness
    Setup,
    /// Capacity signal subscription
    Watch,
    /// Load generation
    Load,
    /// Correlation and record building
    Report,
}

impl fmt::Display for TierPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TierPhase::Setup => "setup",
            TierPhase::Watch => "watch",
            TierPhase::Load => "load",
            TierPhase::Report => "report",
        };
        f.write_str(name)
    }
}

/// A failed tier
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Tier {tier} failed during {phase}: {source}")]
pub struct TierError {
    pub tier: String,
    pub phase: TierPhase,
    #[source]
    pub source: HarnessError,
}

impl TierError {
    pub fn new(tier: impl Into<String>, phase: TierPhase, source: impl Into<HarnessError>) -> Self {
        Self {
            tier: tier.into(),
            phase,
            source: source.into(),
        }
    }
}

/// Suite level failures
#[derive(Error, Debug)]
pub enum SuiteError {
    /// A tier failed under the abort policy. Records of the tiers that
    /// completed before it are kept.
    #[error("{failure} ({} records from earlier tiers kept)", .completed.len())]
    Aborted {
        failure: Box<TierError>,
        completed: Vec<TestCaseRecord>,
    },

    #[error("Failed to publish report: {0}")]
    Publish(#[source] SinkError),

    #[error("No tiers configured")]
    NoTiers,
}

impl SuiteError {
    /// The failing tier, if the suite was aborted by one
    pub fn tier_failure(&self) -> Option<&TierError> {
        match self {
            SuiteError::Aborted { failure, .. } => Some(failure),
            _ => None,
        }
    }
}
