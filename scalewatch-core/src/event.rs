//! Scale events and the per-tier event log

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// One observed change in the ready capacity of the service under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScaleEvent {
    pub old_scale: u32,
    pub new_scale: u32,
    pub timestamp: DateTime<Utc>,
}

impl ScaleEvent {
    pub fn new(old_scale: u32, new_scale: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            old_scale,
            new_scale,
            timestamp,
        }
    }
}

/// Append-only log of scale events shared between the watcher task and the
/// orchestrator.
///
/// Events are kept in arrival order, which is not necessarily timestamp
/// order. Use [`sorted_by_timestamp`] when strict time order matters.
#[derive(Debug, Clone, Default)]
pub struct ScaleEventLog {
    events: Arc<Mutex<Vec<ScaleEvent>>>,
}

impl ScaleEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::with_capacity(capacity))),
        }
    }

    /// Pre-size the log for a tier. The autoscaler should add roughly one
    /// replica per `target_concurrency` clients, so ten events per expected
    /// replica leaves ample headroom.
    pub fn sized_for(num_clients: u32, target_concurrency: u32) -> Self {
        let expected_replicas = num_clients / target_concurrency.max(1);
        Self::with_capacity(expected_replicas as usize * 10)
    }

    pub fn append(&self, event: ScaleEvent) {
        self.events.lock().push(event);
    }

    /// Owned copy of the events recorded so far
    pub fn snapshot(&self) -> Vec<ScaleEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

/// Events in timestamp order. Events with equal timestamps keep their
/// arrival order.
pub fn sorted_by_timestamp(events: &[ScaleEvent]) -> Vec<ScaleEvent> {
    let mut sorted = events.to_vec();
    sorted.sort_by_key(|event| event.timestamp);
    sorted
}
