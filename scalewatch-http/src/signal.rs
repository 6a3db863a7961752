//! Capacity signal read by polling an HTTP endpoint
//!
//! The endpoint answers with the ready count of each resource, either as
//! `{"resources": [{"name": "svc", "ready": 2}]}` or as the bare array.

use crate::client::{build_client, parse_http_url};
use crate::config::HttpConfig;
use crate::errors::HttpError;
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use scalewatch_core::{CapacitySignalSource, CapacityStream, CapacityUpdate, WatchError};
use serde::Deserialize;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

/// Ready count of one resource as reported by the endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceCapacity {
    pub name: String,
    pub ready: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CapacityDocument {
    Wrapped { resources: Vec<ResourceCapacity> },
    Bare(Vec<ResourceCapacity>),
}

/// Parse a capacity document
pub fn parse_capacity(body: &[u8]) -> Result<Vec<ResourceCapacity>, HttpError> {
    let document: CapacityDocument = serde_json::from_slice(body)?;
    Ok(match document {
        CapacityDocument::Wrapped { resources } => resources,
        CapacityDocument::Bare(resources) => resources,
    })
}

/// Signal source polling a capacity endpoint.
///
/// Every poll emits one update per listed resource; the watcher discards
/// the ones whose ready count did not change. A stream ends with an error
/// after `max_consecutive_failures` failed polls in a row.
#[derive(Debug, Clone)]
pub struct PollingSignalSource {
    client: Client,
    url: String,
    poll_interval: Duration,
    max_consecutive_failures: u32,
}

impl PollingSignalSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            poll_interval: Duration::from_millis(500),
            max_consecutive_failures: 5,
        }
    }

    pub fn from_config(config: &HttpConfig, url: impl Into<String>) -> Result<Self, HttpError> {
        Ok(Self::new(build_client(config)?, url))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_consecutive_failures(mut self, failures: u32) -> Self {
        self.max_consecutive_failures = failures.max(1);
        self
    }

    async fn fetch(&self) -> Result<Vec<CapacityUpdate>, HttpError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::UnexpectedStatus {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }
        let body = response.bytes().await?;
        let observed_at = Utc::now();

        Ok(parse_capacity(&body)?
            .into_iter()
            .map(|resource| {
                CapacityUpdate::new(resource.name, resource.ready).observed_at(observed_at)
            })
            .collect())
    }
}

struct PollState {
    source: PollingSignalSource,
    pending: VecDeque<CapacityUpdate>,
    failures: u32,
    finished: bool,
}

#[async_trait]
impl CapacitySignalSource for PollingSignalSource {
    async fn subscribe(&self) -> Result<CapacityStream, WatchError> {
        parse_http_url(&self.url).map_err(|e| WatchError::Subscribe(e.to_string()))?;

        // the first poll doubles as the subscription check
        let initial = self
            .fetch()
            .await
            .map_err(|e| WatchError::Subscribe(e.to_string()))?;
        debug!(
            "Subscribed to capacity signal at {} ({} resources)",
            self.url,
            initial.len()
        );

        let state = PollState {
            source: self.clone(),
            pending: initial.into(),
            failures: 0,
            finished: false,
        };

        let updates = stream::unfold(state, |mut state| async move {
            loop {
                if state.finished {
                    return None;
                }
                if let Some(update) = state.pending.pop_front() {
                    return Some((Ok(update), state));
                }

                tokio::time::sleep(state.source.poll_interval).await;
                match state.source.fetch().await {
                    Ok(updates) => {
                        state.failures = 0;
                        state.pending.extend(updates);
                    }
                    Err(e) => {
                        state.failures += 1;
                        warn!(
                            "Capacity poll of {} failed ({} in a row): {}",
                            state.source.url, state.failures, e
                        );
                        if state.failures >= state.source.max_consecutive_failures {
                            state.finished = true;
                            let error = WatchError::Stream(format!(
                                "{} consecutive polls of {} failed, last: {}",
                                state.failures, state.source.url, e
                            ));
                            return Some((Err(error), state));
                        }
                    }
                }
            }
        });

        Ok(updates.boxed())
    }
}
