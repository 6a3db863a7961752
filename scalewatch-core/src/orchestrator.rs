//! Tier orchestration
//!
//! Each tier runs on a fresh target, event log and watch:
//!
//! ```text
//! Idle -> WatcherStarted -> LoadRunning -> WatcherStopped -> Correlated -> Reported -> Idle
//! ```
//!
//! A failure moves the tier to `Aborted`. The watcher is always stopped and
//! the target torn down before the failure is returned. Tiers never overlap.

use crate::correlate::correlate;
use crate::error::{HarnessError, SuiteError, TierError, TierPhase};
use crate::event::ScaleEventLog;
use crate::load::{LoadDriver, LoadTierConfig, LoadTierRunner};
use crate::report::{ReportBuilder, ReportSink, TestCaseRecord};
use crate::signal::{CapacitySignalSource, ResourcePredicate};
use crate::target::{ReadinessProbe, TargetEndpoint, TargetProvisioner};
use crate::watcher::{ScaleSignalWatcher, WatchHandle};
use scalewatch_resilience::{CleanupId, CleanupRegistry};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What the suite does when a tier fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failing tier
    #[default]
    Abort,
    /// Record the failure and carry on with the next tier
    SkipTier,
}

#[derive(Debug, Clone)]
pub struct SuiteSettings {
    /// Label the report is published under
    pub name: String,
    pub failure_policy: FailurePolicy,
    pub readiness_timeout: Duration,
    /// Per-replica concurrency the autoscaler targets; only sizes the
    /// event log
    pub target_concurrency: u32,
}

impl Default for SuiteSettings {
    fn default() -> Self {
        Self {
            name: "scale-by-load".to_string(),
            failure_policy: FailurePolicy::Abort,
            readiness_timeout: Duration::from_secs(300),
            target_concurrency: 10,
        }
    }
}

/// Lifecycle of a single tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierState {
    Idle,
    WatcherStarted,
    LoadRunning,
    WatcherStopped,
    Correlated,
    Reported,
    Aborted,
}

impl TierState {
    pub fn can_transition_to(self, next: TierState) -> bool {
        use TierState::*;
        matches!(
            (self, next),
            (Idle, WatcherStarted)
                | (WatcherStarted, LoadRunning)
                | (LoadRunning, WatcherStopped)
                | (WatcherStopped, Correlated)
                | (Correlated, Reported)
                | (Reported, Idle)
                // provisioning or subscription failed
                | (Idle, Aborted)
                | (WatcherStarted, Aborted)
                | (LoadRunning, Aborted)
                // nothing to report
                | (Correlated, Aborted)
        )
    }
}

struct TierProgress {
    tier: String,
    state: TierState,
}

impl TierProgress {
    fn new(tier: &str) -> Self {
        Self {
            tier: tier.to_string(),
            state: TierState::Idle,
        }
    }

    fn advance(&mut self, next: TierState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid tier transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(tier = %self.tier, "{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn abort(&mut self, phase: TierPhase, source: impl Into<HarnessError>) -> TierError {
        self.advance(TierState::Aborted);
        let failure = TierError::new(&self.tier, phase, source);
        error!(tier = %self.tier, phase = %phase, "{}", failure.source);
        failure
    }
}

/// Everything the orchestrator talks to
#[derive(Clone)]
pub struct Collaborators {
    pub provisioner: Arc<dyn TargetProvisioner>,
    pub probe: Arc<dyn ReadinessProbe>,
    pub signal_source: Arc<dyn CapacitySignalSource>,
    pub load_driver: Arc<dyn LoadDriver>,
    pub sink: Arc<dyn ReportSink>,
}

/// Records and failures of a finished suite
#[derive(Debug, Default)]
pub struct SuiteOutcome {
    pub records: Vec<TestCaseRecord>,
    pub completed_tiers: Vec<String>,
    /// Tiers skipped under [`FailurePolicy::SkipTier`]
    pub failures: Vec<TierError>,
}

pub struct TierOrchestrator {
    settings: SuiteSettings,
    provisioner: Arc<dyn TargetProvisioner>,
    probe: Arc<dyn ReadinessProbe>,
    watcher: ScaleSignalWatcher,
    runner: LoadTierRunner,
    report: ReportBuilder,
    sink: Arc<dyn ReportSink>,
    cleanup: CleanupRegistry,
}

impl TierOrchestrator {
    pub fn new(settings: SuiteSettings, collaborators: Collaborators) -> Self {
        Self {
            settings,
            provisioner: collaborators.provisioner,
            probe: collaborators.probe,
            watcher: ScaleSignalWatcher::new(collaborators.signal_source),
            runner: LoadTierRunner::new(collaborators.load_driver),
            report: ReportBuilder::new(),
            sink: collaborators.sink,
            cleanup: CleanupRegistry::new(),
        }
    }

    pub fn with_percentiles(mut self, percentiles: impl IntoIterator<Item = f64>) -> Self {
        self.runner = self.runner.with_percentiles(percentiles);
        self
    }

    /// Share a registry with an interrupt handler so an interrupted run
    /// still tears its target down
    pub fn with_cleanup_registry(mut self, cleanup: CleanupRegistry) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn settings(&self) -> &SuiteSettings {
        &self.settings
    }

    pub fn cleanup_registry(&self) -> &CleanupRegistry {
        &self.cleanup
    }

    /// Run the tiers in order and publish their records
    pub async fn run_suite(&self, tiers: &[LoadTierConfig]) -> Result<SuiteOutcome, SuiteError> {
        if tiers.is_empty() {
            return Err(SuiteError::NoTiers);
        }
        if tiers.windows(2).any(|w| w[0].num_clients >= w[1].num_clients) {
            warn!("Tiers are not in increasing client order");
        }

        info!(
            suite = %self.settings.name,
            "Running {} tiers with policy {:?}",
            tiers.len(),
            self.settings.failure_policy
        );

        let mut outcome = SuiteOutcome::default();
        for tier in tiers {
            match self.run_tier(tier).await {
                Ok(records) => {
                    outcome.completed_tiers.push(tier.label());
                    outcome.records.extend(records);
                }
                Err(failure) => match self.settings.failure_policy {
                    FailurePolicy::Abort => {
                        self.publish_partial(&outcome.records).await;
                        return Err(SuiteError::Aborted {
                            failure: Box::new(failure),
                            completed: outcome.records,
                        });
                    }
                    FailurePolicy::SkipTier => {
                        warn!("{}; continuing with the next tier", failure);
                        outcome.failures.push(failure);
                    }
                },
            }
        }

        self.sink
            .publish(&self.settings.name, &outcome.records)
            .await
            .map_err(SuiteError::Publish)?;

        info!(
            suite = %self.settings.name,
            "Suite finished: {} tiers completed, {} failed, {} records",
            outcome.completed_tiers.len(),
            outcome.failures.len(),
            outcome.records.len()
        );
        Ok(outcome)
    }

    /// Run a single tier on its own target
    pub async fn run_tier(&self, tier: &LoadTierConfig) -> Result<Vec<TestCaseRecord>, TierError> {
        let label = tier.label();
        let mut progress = TierProgress::new(&label);

        let endpoint = match self.provisioner.provision(tier).await {
            Ok(endpoint) => endpoint,
            Err(e) => return Err(progress.abort(TierPhase::Setup, e)),
        };
        let teardown = self.register_teardown(&label, &endpoint);

        let outcome = self.measure(tier, &endpoint, &mut progress).await;

        // None when an interrupt already ran it
        if let Some(cleanup) = self.cleanup.run(teardown).await {
            if let Err(e) = cleanup.result {
                warn!(tier = %label, "Teardown failed: {}", e);
            }
        }

        if outcome.is_ok() {
            progress.advance(TierState::Idle);
        }
        outcome
    }

    async fn measure(
        &self,
        tier: &LoadTierConfig,
        endpoint: &TargetEndpoint,
        progress: &mut TierProgress,
    ) -> Result<Vec<TestCaseRecord>, TierError> {
        let label = tier.label();
        let log = ScaleEventLog::sized_for(tier.num_clients, self.settings.target_concurrency);
        let predicate = ResourcePredicate::name_contains(endpoint.resource_name.clone());

        let mut handle = match self.watcher.start(predicate, log.clone()).await {
            Ok(handle) => handle,
            Err(e) => return Err(progress.abort(TierPhase::Watch, e)),
        };
        progress.advance(TierState::WatcherStarted);

        let probe_started = Instant::now();
        info!(tier = %label, "Probing {}", endpoint.probe_url);
        let ready = tokio::select! {
            result = self.probe.wait_until_ready(endpoint, self.settings.readiness_timeout) => Ok(result),
            error = handle.failed() => Err(error),
        };
        match ready {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                stop_watcher(handle, &label).await;
                return Err(progress.abort(TierPhase::Setup, e));
            }
            Err(e) => {
                stop_watcher(handle, &label).await;
                return Err(progress.abort(TierPhase::Watch, e));
            }
        }
        info!(
            tier = %label,
            "Took {:?} for the endpoint to start serving",
            probe_started.elapsed()
        );

        let load_config = endpoint.apply_to(tier);
        progress.advance(TierState::LoadRunning);

        let load = tokio::select! {
            result = self.runner.run(&load_config) => Ok(result),
            error = handle.failed() => Err(error),
        };
        let result = match load {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                stop_watcher(handle, &label).await;
                return Err(progress.abort(TierPhase::Load, e));
            }
            Err(e) => {
                // the load run was dropped with the losing branch
                stop_watcher(handle, &label).await;
                return Err(progress.abort(TierPhase::Watch, e));
            }
        };

        let summary = handle
            .stop()
            .await
            .map_err(|e| progress.abort(TierPhase::Watch, e))?;
        progress.advance(TierState::WatcherStopped);
        debug!(
            tier = %label,
            "Watcher saw {} notifications ({} ignored)",
            summary.notifications,
            summary.ignored
        );

        let correlated = correlate(result.start_time, &log.snapshot());
        for c in &correlated {
            info!(
                tier = %label,
                "Scaled: {} -> {} in {:.3}s",
                c.event.old_scale,
                c.event.new_scale,
                c.elapsed_seconds()
            );
        }
        progress.advance(TierState::Correlated);

        let records = self
            .report
            .build(&label, tier.requested_qps(), &result, &correlated)
            .map_err(|e| progress.abort(TierPhase::Report, e))?;
        progress.advance(TierState::Reported);

        Ok(records)
    }

    fn register_teardown(&self, label: &str, endpoint: &TargetEndpoint) -> CleanupId {
        let provisioner = Arc::clone(&self.provisioner);
        let endpoint = endpoint.clone();
        self.cleanup
            .register(format!("teardown {}", label), move || async move {
                provisioner
                    .teardown(&endpoint)
                    .await
                    .map_err(|e| e.to_string())
            })
    }

    async fn publish_partial(&self, records: &[TestCaseRecord]) {
        if records.is_empty() {
            return;
        }
        match self.sink.publish(&self.settings.name, records).await {
            Ok(()) => info!("Published {} records from completed tiers", records.len()),
            Err(e) => warn!("Failed to publish partial report: {}", e),
        }
    }
}

async fn stop_watcher(handle: WatchHandle, tier: &str) {
    if let Err(e) = handle.stop().await {
        debug!(tier = %tier, "Watcher ended with: {}", e);
    }
}
