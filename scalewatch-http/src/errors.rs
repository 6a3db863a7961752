//! HTTP error types

use scalewatch_resilience::Retryable;

/// Error type for HTTP operations
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(String),

    #[error("Invalid header value for {0}")]
    InvalidHeaderValue(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl HttpError {
    /// Whether the failure happened before the server answered at all
    pub fn is_connect_failure(&self) -> bool {
        match self {
            HttpError::NetworkError(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

impl Retryable for HttpError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            HttpError::NetworkError(_) | HttpError::UnexpectedStatus { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let status = HttpError::UnexpectedStatus {
            status: 503,
            url: "http://t/".to_string(),
        };
        assert!(status.is_retryable());
        assert!(!status.is_connect_failure());
        assert!(!HttpError::InvalidUrl("::".to_string()).is_retryable());
        assert!(!HttpError::ConfigError("bad".to_string()).is_retryable());
    }
}
