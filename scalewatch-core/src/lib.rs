//! Load-driven scale measurement
//!
//! Drives load of increasing concurrency against a service, watches its
//! ready capacity while the load runs, and reports how long each scale step
//! took alongside latency, throughput and error rate for every tier.
//!
//! The external world (target provisioning, readiness, the capacity signal,
//! the load engine and the report destination) is reached through the
//! traits re-exported here; `scalewatch-http` and `scalewatch-output` supply
//! the default implementations.

pub mod correlate;
pub mod error;
pub mod event;
pub mod load;
pub mod orchestrator;
pub mod report;
pub mod signal;
pub mod target;
pub mod watcher;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use correlate::{correlate, CorrelatedEvent};
pub use error::{
    HarnessError, LoadError, ProbeError, ReportError, SetupError, SinkError, SuiteError,
    TierError, TierPhase, WatchError,
};
pub use event::{sorted_by_timestamp, ScaleEvent, ScaleEventLog};
pub use load::{
    LatencyHistogram, LoadDriver, LoadResult, LoadSamples, LoadTierConfig, LoadTierRunner,
    PercentileValue, DEFAULT_PERCENTILES,
};
pub use orchestrator::{
    Collaborators, FailurePolicy, SuiteOutcome, SuiteSettings, TierOrchestrator, TierState,
};
pub use report::{Metric, ReportBuilder, ReportSink, TestCaseRecord};
pub use signal::{
    CapacitySignalSource, CapacityStream, CapacityUpdate, ResourcePredicate, SilentSignalSource,
};
pub use target::{ReadinessProbe, StaticTarget, TargetEndpoint, TargetProvisioner};
pub use watcher::{ScaleSignalWatcher, WatchHandle, WatchSummary};
