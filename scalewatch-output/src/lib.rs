//! # Scalewatch report output
//!
//! Delivers the records of a finished suite to report destinations:
//!
//! - **JUnit XML** in the layout testgrid plots (`perf_latency` properties)
//! - **Structured files**: JSON, compact JSON, YAML and CSV
//! - **Stdout**: a summary table for interactive runs
//!
//! File names are Handlebars templates (`{{suite}}`, `{{timestamp}}`,
//! `{{format}}`, `{{ext}}`) resolved under the configured directory.
//!
//! ## Example
//!
//! ```rust,no_run
//! use scalewatch_config::OutputConfig;
//! use scalewatch_core::{ReportSink, TestCaseRecord};
//! use scalewatch_output::build_sink;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sink = build_sink(&OutputConfig::default())?;
//! let records = vec![TestCaseRecord {
//!     name: "clients-010/requestCount".to_string(),
//!     value: 6000.0,
//! }];
//! sink.publish("scale-by-load", &records).await?;
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod format;
pub mod junit;
pub mod sinks;
pub mod template;

pub use errors::DeliveryError;
pub use format::{render, ReportDocument};
pub use junit::{render_junit, PERF_PROPERTY};
pub use sinks::{FanoutSink, FilesystemConfig, FilesystemSink, StdoutSink};
pub use template::TemplateEngine;

use scalewatch_config::OutputConfig;
use std::sync::Arc;
use tracing::debug;

/// Build the sinks named by the output configuration
pub fn build_sink(config: &OutputConfig) -> Result<FanoutSink, DeliveryError> {
    let mut fanout = FanoutSink::new();

    if !config.formats.is_empty() {
        let filesystem = FilesystemSink::new(FilesystemConfig::from(config), TemplateEngine::new());
        filesystem.validate_config()?;
        debug!(
            "Writing {:?} reports to {}",
            config.formats,
            config.directory.display()
        );
        fanout.push(Arc::new(filesystem));
    }

    if config.stdout {
        fanout.push(Arc::new(StdoutSink::new()));
    }

    Ok(fanout)
}
