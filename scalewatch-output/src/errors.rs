//! Error types for report delivery

use scalewatch_core::SinkError;
use thiserror::Error;

/// Errors while rendering or writing a report
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Template rendering failed for '{template}': {error}")]
    TemplateRender { template: String, error: String },

    #[error("Serialization failed for format {format}: {error}")]
    Serialization { format: String, error: String },

    #[error("Filesystem operation '{operation}' failed on {path}: {error}")]
    Filesystem {
        path: String,
        operation: String,
        error: String,
    },

    #[error("File already exists: {path}")]
    FileExists { path: String },

    #[error("Format {format} is not supported by this build")]
    UnsupportedFormat { format: String },
}

impl DeliveryError {
    pub(crate) fn serialization(format: &str, error: impl ToString) -> Self {
        DeliveryError::Serialization {
            format: format.to_string(),
            error: error.to_string(),
        }
    }
}

impl From<DeliveryError> for SinkError {
    fn from(error: DeliveryError) -> Self {
        match error {
            DeliveryError::TemplateRender { .. }
            | DeliveryError::Serialization { .. }
            | DeliveryError::UnsupportedFormat { .. } => SinkError::Format(error.to_string()),
            DeliveryError::Filesystem { .. } | DeliveryError::FileExists { .. } => {
                SinkError::Delivery {
                    sink: "filesystem".to_string(),
                    message: error.to_string(),
                }
            }
        }
    }
}
