//! In-memory collaborators
//!
//! Deterministic stand-ins for the signal source, load driver, probe,
//! provisioner and report sink. Used by the unit tests here, by the
//! integration tests and by `scalewatch run --dry-run`.

use crate::error::{LoadError, ProbeError, SetupError, SinkError, WatchError};
use crate::load::{LatencyHistogram, LoadDriver, LoadSamples, LoadTierConfig};
use crate::report::{ReportSink, TestCaseRecord};
use crate::signal::{CapacitySignalSource, CapacityStream, CapacityUpdate};
use crate::target::{ReadinessProbe, TargetEndpoint, TargetProvisioner};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

type UpdateSender = mpsc::UnboundedSender<Result<CapacityUpdate, WatchError>>;

#[derive(Default)]
struct ChannelState {
    subscribers: Vec<UpdateSender>,
    refusal: Option<String>,
    subscriptions: usize,
}

/// Signal source fed by hand. Every subscription receives every update
/// emitted while it is open.
#[derive(Clone, Default)]
pub struct ChannelSignalSource {
    state: Arc<Mutex<ChannelState>>,
}

impl ChannelSignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an update; returns how many open subscriptions received it
    pub fn emit(&self, update: CapacityUpdate) -> usize {
        let mut state = self.state.lock();
        state
            .subscribers
            .retain(|subscriber| subscriber.send(Ok(update.clone())).is_ok());
        state.subscribers.len()
    }

    /// Fail every open subscription
    pub fn fail(&self, error: WatchError) {
        let mut state = self.state.lock();
        for subscriber in state.subscribers.drain(..) {
            let _ = subscriber.send(Err(error.clone()));
        }
    }

    /// End every open subscription's stream
    pub fn disconnect(&self) {
        self.state.lock().subscribers.clear();
    }

    pub fn refuse_subscriptions(&self, reason: impl Into<String>) {
        self.state.lock().refusal = Some(reason.into());
    }

    /// Subscriptions made so far
    pub fn subscriptions(&self) -> usize {
        self.state.lock().subscriptions
    }

    /// Subscriptions whose consumer is still alive
    pub fn active_subscribers(&self) -> usize {
        self.state
            .lock()
            .subscribers
            .iter()
            .filter(|subscriber| !subscriber.is_closed())
            .count()
    }
}

#[async_trait]
impl CapacitySignalSource for ChannelSignalSource {
    async fn subscribe(&self) -> Result<CapacityStream, WatchError> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.refusal {
            return Err(WatchError::Subscribe(reason.clone()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.push(tx);
        state.subscriptions += 1;
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

#[derive(Debug, Clone, Copy)]
enum ScriptStep {
    Scale { at: Duration, ready: u32 },
    Disconnect { at: Duration },
}

impl ScriptStep {
    fn at(&self) -> Duration {
        match self {
            ScriptStep::Scale { at, .. } | ScriptStep::Disconnect { at } => *at,
        }
    }
}

/// Load driver that fakes a run of `config.duration` on the tokio clock.
///
/// It produces `requested_qps * duration` samples at a fixed latency and
/// can replay a scale script into a [`ChannelSignalSource`] while it runs,
/// stamping each update with `start + offset`.
pub struct ScriptedLoadDriver {
    latency: Duration,
    error_rate: f64,
    signal: Option<(ChannelSignalSource, String, u32)>,
    script: Vec<ScriptStep>,
    failure: Option<(u32, LoadError)>,
    empty_run: Option<u32>,
    runs: AtomicU32,
}

impl Default for ScriptedLoadDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedLoadDriver {
    pub fn new() -> Self {
        Self {
            latency: Duration::from_millis(100),
            error_rate: 0.0,
            signal: None,
            script: Vec::new(),
            failure: None,
            empty_run: None,
            runs: AtomicU32::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fraction (0 to 1) of requests reported as failed
    pub fn with_error_rate(mut self, error_rate: f64) -> Self {
        self.error_rate = error_rate.clamp(0.0, 1.0);
        self
    }

    /// Replay the scale script for `resource`, starting from `initial_ready`
    pub fn with_signal(
        mut self,
        source: ChannelSignalSource,
        resource: impl Into<String>,
        initial_ready: u32,
    ) -> Self {
        self.signal = Some((source, resource.into(), initial_ready));
        self
    }

    pub fn scale_at(mut self, at: Duration, ready: u32) -> Self {
        self.script.push(ScriptStep::Scale { at, ready });
        self
    }

    pub fn disconnect_at(mut self, at: Duration) -> Self {
        self.script.push(ScriptStep::Disconnect { at });
        self
    }

    /// Fail every run
    pub fn failing(self, error: LoadError) -> Self {
        self.failing_from_run(1, error)
    }

    /// Fail the `run`-th run (1 based) and every later one
    pub fn failing_from_run(mut self, run: u32, error: LoadError) -> Self {
        self.failure = Some((run, error));
        self
    }

    /// Return no samples on the `run`-th run (1 based)
    pub fn empty_on_run(mut self, run: u32) -> Self {
        self.empty_run = Some(run);
        self
    }

    pub fn runs(&self) -> u32 {
        self.runs.load(Ordering::SeqCst)
    }

    async fn replay(
        &self,
        started: tokio::time::Instant,
        start_time: chrono::DateTime<Utc>,
        duration: Duration,
    ) -> Result<(), LoadError> {
        let Some((source, resource, initial_ready)) = &self.signal else {
            return Ok(());
        };

        let mut steps = self.script.clone();
        steps.sort_by_key(ScriptStep::at);

        let mut current = *initial_ready;
        for step in steps.into_iter().filter(|step| step.at() < duration) {
            tokio::time::sleep_until(started + step.at()).await;
            match step {
                ScriptStep::Scale { at, ready } => {
                    let offset = TimeDelta::from_std(at)
                        .map_err(|e| LoadError::Driver(e.to_string()))?;
                    source.emit(
                        CapacityUpdate::new(resource.clone(), ready)
                            .with_previous(current)
                            .observed_at(start_time + offset),
                    );
                    current = ready;
                }
                ScriptStep::Disconnect { .. } => source.disconnect(),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LoadDriver for ScriptedLoadDriver {
    async fn run_load(&self, config: &LoadTierConfig) -> Result<LoadSamples, LoadError> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((from_run, error)) = &self.failure {
            if run >= *from_run {
                return Err(error.clone());
            }
        }

        let started = tokio::time::Instant::now();
        let start_time = Utc::now();

        self.replay(started, start_time, config.duration).await?;
        tokio::time::sleep_until(started + config.duration).await;

        let mut histogram = LatencyHistogram::new()?;
        let total = if self.empty_run == Some(run) {
            0
        } else {
            (config.requested_qps() * config.duration.as_secs_f64()).round() as u64
        };
        for i in 0..total {
            // spread latencies over a 10ms band above the base latency
            histogram.record(self.latency + Duration::from_micros((i % 10) * 1000));
        }

        Ok(LoadSamples {
            start_time,
            elapsed: started.elapsed(),
            histogram,
            total,
            errors: (total as f64 * self.error_rate).round() as u64,
        })
    }
}

/// Probe with a fixed answer
#[derive(Debug)]
pub struct StaticProbe {
    ready: bool,
    calls: AtomicU32,
}

impl StaticProbe {
    pub fn ready() -> Self {
        Self {
            ready: true,
            calls: AtomicU32::new(0),
        }
    }

    /// Waits out the whole timeout, then fails
    pub fn never_ready() -> Self {
        Self {
            ready: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadinessProbe for StaticProbe {
    async fn wait_until_ready(
        &self,
        endpoint: &TargetEndpoint,
        timeout: Duration,
    ) -> Result<(), ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.ready {
            return Ok(());
        }
        tokio::time::sleep(timeout).await;
        Err(ProbeError::Timeout {
            url: endpoint.probe_url.clone(),
            waited: timeout,
            attempts: 1,
            last_error: Some("target never became ready".to_string()),
        })
    }
}

/// Provisioner that hands out a fixed endpoint and counts calls
#[derive(Debug)]
pub struct RecordingProvisioner {
    endpoint: TargetEndpoint,
    failure: Option<String>,
    provisions: AtomicU32,
    teardowns: AtomicU32,
}

impl RecordingProvisioner {
    pub fn new(endpoint: TargetEndpoint) -> Self {
        Self {
            endpoint,
            failure: None,
            provisions: AtomicU32::new(0),
            teardowns: AtomicU32::new(0),
        }
    }

    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    pub fn provisions(&self) -> u32 {
        self.provisions.load(Ordering::SeqCst)
    }

    pub fn teardowns(&self) -> u32 {
        self.teardowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TargetProvisioner for RecordingProvisioner {
    async fn provision(&self, _tier: &LoadTierConfig) -> Result<TargetEndpoint, SetupError> {
        self.provisions.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(reason) => Err(SetupError::Provision(reason.clone())),
            None => Ok(self.endpoint.clone()),
        }
    }

    async fn teardown(&self, _endpoint: &TargetEndpoint) -> Result<(), SetupError> {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink that keeps everything published to it
#[derive(Clone, Default)]
pub struct MemorySink {
    published: Arc<Mutex<Vec<(String, Vec<TestCaseRecord>)>>>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<(String, Vec<TestCaseRecord>)> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl ReportSink for MemorySink {
    async fn publish(&self, suite: &str, records: &[TestCaseRecord]) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::Delivery {
                sink: "memory".to_string(),
                message: "sink configured to fail".to_string(),
            });
        }
        self.published
            .lock()
            .push((suite.to_string(), records.to_vec()));
        Ok(())
    }
}
