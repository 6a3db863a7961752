//! Capacity signal watcher
//!
//! The watcher consumes a [`CapacityStream`] on its own task and appends a
//! [`ScaleEvent`] to the tier's [`ScaleEventLog`] whenever the ready count
//! of a matching resource changes. Stopping the watcher drains everything
//! the source has already delivered and then joins the task, so once
//! [`WatchHandle::stop`] returns the log no longer changes.

use crate::error::WatchError;
use crate::event::{ScaleEvent, ScaleEventLog};
use crate::signal::{CapacitySignalSource, CapacityStream, CapacityUpdate, ResourcePredicate};
use chrono::Utc;
use futures::{FutureExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Counters describing one watch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    /// Updates received from the source
    pub notifications: u64,
    /// Updates for resources the predicate rejected
    pub ignored: u64,
    /// Scale events appended to the log
    pub recorded: u64,
}

/// Starts watches against a capacity signal source
#[derive(Clone)]
pub struct ScaleSignalWatcher {
    source: Arc<dyn CapacitySignalSource>,
}

impl ScaleSignalWatcher {
    pub fn new(source: Arc<dyn CapacitySignalSource>) -> Self {
        Self { source }
    }

    /// Subscribe and start recording transitions of matching resources
    /// into `log`. Returns once the subscription is established; delivery
    /// happens on a spawned task.
    pub async fn start(
        &self,
        predicate: ResourcePredicate,
        log: ScaleEventLog,
    ) -> Result<WatchHandle, WatchError> {
        let stream = self.source.subscribe().await?;
        let (stop_tx, stop_rx) = oneshot::channel();

        debug!("Watching capacity signal for resources where {}", predicate);
        let task = tokio::spawn(watch(stream, predicate, log, stop_rx));

        Ok(WatchHandle {
            stop_tx: Some(stop_tx),
            task,
            outcome: None,
        })
    }
}

/// Handle to a running watch
pub struct WatchHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<WatchSummary, WatchError>>,
    outcome: Option<Result<WatchSummary, WatchError>>,
}

impl WatchHandle {
    /// Resolves with the watcher's error if it fails before being stopped.
    /// Never resolves for a healthy watcher, which makes it suitable as a
    /// `tokio::select!` branch next to the load run.
    pub async fn failed(&mut self) -> WatchError {
        match self.join().await {
            Err(error) => error,
            Ok(_) => std::future::pending().await,
        }
    }

    /// Stop the watch. No event is appended after this returns.
    pub async fn stop(mut self) -> Result<WatchSummary, WatchError> {
        if let Some(stop_tx) = self.stop_tx.take() {
            // the task may already be gone after a failure
            let _ = stop_tx.send(());
        }
        self.join().await
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some() || self.task.is_finished()
    }

    async fn join(&mut self) -> Result<WatchSummary, WatchError> {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }

        let outcome = match (&mut self.task).await {
            Ok(result) => result,
            Err(e) => Err(WatchError::TaskFailed(e.to_string())),
        };
        self.outcome = Some(outcome.clone());
        outcome
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("stopped", &self.stop_tx.is_none())
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Last seen ready count per resource
#[derive(Debug, Default)]
pub(crate) struct TransitionTracker {
    last_seen: HashMap<String, u32>,
}

impl TransitionTracker {
    /// The scale event an update implies, if any. The first update for a
    /// resource only establishes the baseline unless the source supplied
    /// the previous count itself.
    pub(crate) fn observe(&mut self, update: &CapacityUpdate) -> Option<ScaleEvent> {
        let previous = self
            .last_seen
            .insert(update.resource.clone(), update.ready)
            .or(update.previous_ready)?;

        if previous == update.ready {
            return None;
        }

        Some(ScaleEvent::new(
            previous,
            update.ready,
            update.observed_at.unwrap_or_else(Utc::now),
        ))
    }
}

struct Recorder {
    predicate: ResourcePredicate,
    log: ScaleEventLog,
    tracker: TransitionTracker,
    summary: WatchSummary,
}

impl Recorder {
    fn record(&mut self, update: CapacityUpdate) {
        self.summary.notifications += 1;

        if !self.predicate.matches(&update.resource) {
            self.summary.ignored += 1;
            return;
        }

        if let Some(event) = self.tracker.observe(&update) {
            debug!(
                "{} scaled {} -> {} at {}",
                update.resource, event.old_scale, event.new_scale, event.timestamp
            );
            self.log.append(event);
            self.summary.recorded += 1;
        }
    }

    /// Consume whatever the stream has ready without waiting for more
    fn drain(&mut self, stream: &mut CapacityStream) {
        while let Some(item) = stream.next().now_or_never().flatten() {
            match item {
                Ok(update) => self.record(update),
                Err(e) => {
                    debug!("Ignoring capacity signal error after stop: {}", e);
                    break;
                }
            }
        }
    }
}

async fn watch(
    mut stream: CapacityStream,
    predicate: ResourcePredicate,
    log: ScaleEventLog,
    mut stop_rx: oneshot::Receiver<()>,
) -> Result<WatchSummary, WatchError> {
    let mut recorder = Recorder {
        predicate,
        log,
        tracker: TransitionTracker::default(),
        summary: WatchSummary::default(),
    };

    loop {
        tokio::select! {
            biased;

            // a dropped handle stops the watch as well
            _ = &mut stop_rx => {
                recorder.drain(&mut stream);
                info!(
                    "Watcher stopped: {} notifications, {} ignored, {} scale events",
                    recorder.summary.notifications,
                    recorder.summary.ignored,
                    recorder.summary.recorded
                );
                return Ok(recorder.summary);
            }

            item = stream.next() => match item {
                Some(Ok(update)) => recorder.record(update),
                Some(Err(e)) => {
                    warn!("Capacity signal failed: {}", e);
                    return Err(e);
                }
                None => {
                    warn!("Capacity signal stream ended unexpectedly");
                    return Err(WatchError::Disconnected {
                        notifications: recorder.summary.notifications,
                    });
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ChannelSignalSource;
    use chrono::TimeDelta;
    use proptest::prelude::*;

    fn watcher(source: &ChannelSignalSource) -> ScaleSignalWatcher {
        ScaleSignalWatcher::new(Arc::new(source.clone()))
    }

    #[tokio::test]
    async fn test_records_only_changes_of_matching_resources() {
        let source = ChannelSignalSource::new();
        let log = ScaleEventLog::new();
        let handle = watcher(&source)
            .start(ResourcePredicate::name_contains("autoscale"), log.clone())
            .await
            .unwrap();

        source.emit(CapacityUpdate::new("autoscale-go", 0));
        source.emit(CapacityUpdate::new("autoscale-go", 1));
        source.emit(CapacityUpdate::new("autoscale-go", 1));
        source.emit(CapacityUpdate::new("activator", 4));
        source.emit(CapacityUpdate::new("autoscale-go", 3));

        let summary = handle.stop().await.unwrap();
        let events = log.snapshot();

        assert_eq!(summary.notifications, 5);
        assert_eq!(summary.ignored, 1);
        assert_eq!(summary.recorded, 2);
        assert_eq!(
            events
                .iter()
                .map(|e| (e.old_scale, e.new_scale))
                .collect::<Vec<_>>(),
            vec![(0, 1), (1, 3)]
        );
    }

    #[tokio::test]
    async fn test_resources_are_tracked_independently() {
        let source = ChannelSignalSource::new();
        let log = ScaleEventLog::new();
        let handle = watcher(&source)
            .start(ResourcePredicate::any_resource(), log.clone())
            .await
            .unwrap();

        source.emit(CapacityUpdate::new("a", 1));
        source.emit(CapacityUpdate::new("b", 5));
        source.emit(CapacityUpdate::new("a", 2));
        source.emit(CapacityUpdate::new("b", 5));

        handle.stop().await.unwrap();
        let events = log.snapshot();
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].old_scale, events[0].new_scale), (1, 2));
    }

    #[tokio::test]
    async fn test_source_supplied_previous_and_timestamp() {
        let source = ChannelSignalSource::new();
        let log = ScaleEventLog::new();
        let handle = watcher(&source)
            .start(ResourcePredicate::any_resource(), log.clone())
            .await
            .unwrap();

        let observed = Utc::now() - TimeDelta::seconds(30);
        source.emit(CapacityUpdate::new("svc", 1).with_previous(0).observed_at(observed));
        // identical previous and current count is not a change
        source.emit(CapacityUpdate::new("other", 2).with_previous(2));

        handle.stop().await.unwrap();
        assert_eq!(log.snapshot(), vec![ScaleEvent::new(0, 1, observed)]);
    }

    #[tokio::test]
    async fn test_no_appends_after_stop() {
        let source = ChannelSignalSource::new();
        let log = ScaleEventLog::new();
        let handle = watcher(&source)
            .start(ResourcePredicate::any_resource(), log.clone())
            .await
            .unwrap();

        source.emit(CapacityUpdate::new("svc", 0));
        source.emit(CapacityUpdate::new("svc", 1));
        handle.stop().await.unwrap();
        let frozen = log.snapshot();
        assert_eq!(frozen.len(), 1);

        source.emit(CapacityUpdate::new("svc", 2));
        source.emit(CapacityUpdate::new("svc", 3));
        tokio::task::yield_now().await;

        assert_eq!(log.snapshot(), frozen);
    }

    #[tokio::test]
    async fn test_stream_error_is_surfaced() {
        let source = ChannelSignalSource::new();
        let mut handle = watcher(&source)
            .start(ResourcePredicate::any_resource(), ScaleEventLog::new())
            .await
            .unwrap();

        source.fail(WatchError::Stream("watch expired".to_string()));

        let error = handle.failed().await;
        assert_eq!(error, WatchError::Stream("watch expired".to_string()));
        // the cached outcome is returned again on stop
        assert_eq!(handle.stop().await.unwrap_err(), error);
    }

    #[tokio::test]
    async fn test_disconnect_is_surfaced() {
        let source = ChannelSignalSource::new();
        let mut handle = watcher(&source)
            .start(ResourcePredicate::any_resource(), ScaleEventLog::new())
            .await
            .unwrap();

        source.emit(CapacityUpdate::new("svc", 1));
        source.disconnect();

        assert_eq!(
            handle.failed().await,
            WatchError::Disconnected { notifications: 1 }
        );
    }

    #[tokio::test]
    async fn test_subscribe_failure() {
        let source = ChannelSignalSource::new();
        source.refuse_subscriptions("informer not synced");

        let result = watcher(&source)
            .start(ResourcePredicate::any_resource(), ScaleEventLog::new())
            .await;
        assert!(matches!(result, Err(WatchError::Subscribe(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_does_not_resolve_for_healthy_watch() {
        let source = ChannelSignalSource::new();
        let mut handle = watcher(&source)
            .start(ResourcePredicate::any_resource(), ScaleEventLog::new())
            .await
            .unwrap();

        let raced = tokio::time::timeout(std::time::Duration::from_secs(5), handle.failed()).await;
        assert!(raced.is_err());
        assert!(handle.stop().await.is_ok());
    }

    proptest! {
        #[test]
        fn prop_one_event_per_change(counts in proptest::collection::vec(0u32..6, 1..60)) {
            let mut tracker = TransitionTracker::default();
            let events: Vec<ScaleEvent> = counts
                .iter()
                .filter_map(|ready| tracker.observe(&CapacityUpdate::new("svc", *ready)))
                .collect();

            let expected: Vec<(u32, u32)> = counts
                .windows(2)
                .filter(|pair| pair[0] != pair[1])
                .map(|pair| (pair[0], pair[1]))
                .collect();

            prop_assert_eq!(
                events.iter().map(|e| (e.old_scale, e.new_scale)).collect::<Vec<_>>(),
                expected
            );
        }
    }
}
