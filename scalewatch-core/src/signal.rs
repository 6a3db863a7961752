//! Capacity signal abstraction
//!
//! A capacity signal source delivers ready-count updates for named
//! resources. The watcher only needs the resource name and the ready count;
//! everything else about the underlying resource stays with the source.

use crate::error::WatchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::fmt;
use std::sync::Arc;

/// A ready-count observation for one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityUpdate {
    pub resource: String,
    /// Ready count before this update, when the source knows it
    pub previous_ready: Option<u32>,
    pub ready: u32,
    /// When the source observed the change. The watcher stamps updates
    /// without one on delivery.
    pub observed_at: Option<DateTime<Utc>>,
}

impl CapacityUpdate {
    pub fn new(resource: impl Into<String>, ready: u32) -> Self {
        Self {
            resource: resource.into(),
            previous_ready: None,
            ready,
            observed_at: None,
        }
    }

    pub fn with_previous(mut self, previous_ready: u32) -> Self {
        self.previous_ready = Some(previous_ready);
        self
    }

    pub fn observed_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.observed_at = Some(timestamp);
        self
    }
}

pub type CapacityStream = BoxStream<'static, Result<CapacityUpdate, WatchError>>;

/// Source of capacity updates.
///
/// Every call to `subscribe` yields an independent stream. A stream that
/// ends is treated as a disconnect.
#[async_trait]
pub trait CapacitySignalSource: Send + Sync {
    async fn subscribe(&self) -> Result<CapacityStream, WatchError>;
}

/// Source for targets without an observable capacity signal. Its stream
/// never yields and never ends, so no scale events are recorded.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSignalSource;

#[async_trait]
impl CapacitySignalSource for SilentSignalSource {
    async fn subscribe(&self) -> Result<CapacityStream, WatchError> {
        Ok(futures::stream::pending().boxed())
    }
}

/// Selects the resources whose updates are considered
#[derive(Clone)]
pub struct ResourcePredicate {
    description: String,
    matcher: Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

impl ResourcePredicate {
    pub fn new<F>(description: impl Into<String>, matcher: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            matcher: Arc::new(matcher),
        }
    }

    /// Resources whose name contains `fragment`, e.g. the endpoints of a
    /// service named after it
    pub fn name_contains(fragment: impl Into<String>) -> Self {
        let fragment = fragment.into();
        let description = format!("name contains '{}'", fragment);
        Self::new(description, move |name| name.contains(&fragment))
    }

    pub fn name_equals(expected: impl Into<String>) -> Self {
        let expected = expected.into();
        let description = format!("name is '{}'", expected);
        Self::new(description, move |name| name == expected)
    }

    pub fn any_resource() -> Self {
        Self::new("any resource", |_| true)
    }

    pub fn matches(&self, resource: &str) -> bool {
        (self.matcher)(resource)
    }
}

impl fmt::Debug for ResourcePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResourcePredicate")
            .field(&self.description)
            .finish()
    }
}

impl fmt::Display for ResourcePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}
