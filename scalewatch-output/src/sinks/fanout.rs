//! Publishing to several sinks at once

use async_trait::async_trait;
use futures::future::join_all;
use scalewatch_core::{ReportSink, SinkError, TestCaseRecord};
use std::sync::Arc;
use tracing::warn;

/// Publishes every suite to all of its sinks.
///
/// A failing sink does not keep the others from receiving the records; the
/// first failure is returned once all sinks have been tried.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ReportSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn push(&mut self, sink: Arc<dyn ReportSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl ReportSink for FanoutSink {
    async fn publish(&self, suite: &str, records: &[TestCaseRecord]) -> Result<(), SinkError> {
        let results = join_all(self.sinks.iter().map(|sink| sink.publish(suite, records))).await;

        let mut first_error = None;
        for error in results.into_iter().filter_map(Result::err) {
            warn!("Report sink failed for suite {}: {}", suite, error);
            first_error.get_or_insert(error);
        }
        first_error.map_or(Ok(()), Err)
    }
}
