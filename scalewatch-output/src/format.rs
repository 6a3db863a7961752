//! Rendering records in the configured report formats

use crate::errors::DeliveryError;
use crate::junit::render_junit;
use chrono::{DateTime, Utc};
use scalewatch_config::ReportFormat;
use scalewatch_core::TestCaseRecord;
use serde::Serialize;

/// Report body of the structured formats
#[derive(Debug, Serialize)]
pub struct ReportDocument<'a> {
    pub suite: &'a str,
    pub generated_at: DateTime<Utc>,
    pub records: &'a [TestCaseRecord],
}

impl<'a> ReportDocument<'a> {
    pub fn new(suite: &'a str, records: &'a [TestCaseRecord]) -> Self {
        Self {
            suite,
            generated_at: Utc::now(),
            records,
        }
    }
}

/// Render a report in `format`
pub fn render(
    format: ReportFormat,
    document: &ReportDocument<'_>,
) -> Result<Vec<u8>, DeliveryError> {
    match format {
        ReportFormat::Junit => Ok(render_junit(document.suite, document.records)?.into_bytes()),
        ReportFormat::Json => serde_json::to_vec_pretty(document)
            .map_err(|e| DeliveryError::serialization("json", e)),
        ReportFormat::JsonCompact => serde_json::to_vec(document)
            .map_err(|e| DeliveryError::serialization("json_compact", e)),
        #[cfg(feature = "yaml")]
        ReportFormat::Yaml => serde_yaml::to_string(document)
            .map(String::into_bytes)
            .map_err(|e| DeliveryError::serialization("yaml", e)),
        #[cfg(not(feature = "yaml"))]
        ReportFormat::Yaml => Err(DeliveryError::UnsupportedFormat {
            format: "yaml".to_string(),
        }),
        #[cfg(feature = "csv")]
        ReportFormat::Csv => render_csv(document),
        #[cfg(not(feature = "csv"))]
        ReportFormat::Csv => Err(DeliveryError::UnsupportedFormat {
            format: "csv".to_string(),
        }),
    }
}

/// One row per record: suite, tier, metric, value
#[cfg(feature = "csv")]
fn render_csv(document: &ReportDocument<'_>) -> Result<Vec<u8>, DeliveryError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["suite", "tier", "metric", "value"])
        .map_err(|e| DeliveryError::serialization("csv", e))?;

    for record in document.records {
        let value = record.value.to_string();
        wtr.write_record([document.suite, record.tier(), record.metric(), value.as_str()])
        .map_err(|e| DeliveryError::serialization("csv", e))?;
    }

    wtr.into_inner()
        .map_err(|e| DeliveryError::serialization("csv", e))
}
