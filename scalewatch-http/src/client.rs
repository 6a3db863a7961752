//! Shared HTTP client construction

use crate::config::HttpConfig;
use crate::errors::HttpError;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    redirect::Policy,
    Client,
};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;
use url::Url;

/// Build a client from the configuration.
///
/// The same client is shared by all load workers so connections are pooled
/// across them.
pub fn build_client(config: &HttpConfig) -> Result<Client, HttpError> {
    debug!(
        "Building HTTP client with timeout {:?}, pool size {}",
        config.timeout, config.max_idle_per_host
    );

    Client::builder()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent.clone())
        .danger_accept_invalid_certs(!config.verify_ssl)
        .redirect(Policy::limited(config.max_redirects as usize))
        .pool_max_idle_per_host(config.max_idle_per_host)
        .build()
        .map_err(|e| HttpError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

/// Convert configured headers into a header map.
///
/// `Host` is accepted like any other header and overrides the one derived
/// from the URL.
pub fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, HttpError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_str(name)
            .map_err(|_| HttpError::InvalidHeaderName(name.clone()))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| HttpError::InvalidHeaderValue(name.clone()))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Set `param` to `value` on `url`, replacing any existing value
pub fn with_query_param(url: &str, param: &str, value: &str) -> Result<String, HttpError> {
    let mut parsed =
        Url::parse(url).map_err(|e| HttpError::InvalidUrl(format!("{}: {}", url, e)))?;

    let retained: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| key != param)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    parsed
        .query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair(param, value);

    Ok(parsed.into())
}

/// Parse and check that `url` is an http(s) URL
pub fn parse_http_url(url: &str) -> Result<Url, HttpError> {
    let parsed =
        Url::parse(url).map_err(|e| HttpError::InvalidUrl(format!("{}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(HttpError::InvalidUrl(format!(
            "{}: unsupported scheme '{}'",
            url, scheme
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_query_param_replaces_existing() {
        let url = with_query_param("http://10.0.0.1/?timeout=10&x=1", "timeout", "100").unwrap();
        assert_eq!(url, "http://10.0.0.1/?x=1&timeout=100");

        let url = with_query_param("http://10.0.0.1/", "timeout", "100").unwrap();
        assert_eq!(url, "http://10.0.0.1/?timeout=100");
    }

    #[test]
    fn test_with_query_param_rejects_garbage() {
        assert!(matches!(
            with_query_param("not a url", "timeout", "1"),
            Err(HttpError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_header_map() {
        let mut headers = BTreeMap::new();
        headers.insert("Host".to_string(), "svc.default.example.com".to_string());
        headers.insert("X-Trace".to_string(), "1".to_string());
        let map = header_map(&headers).unwrap();
        assert_eq!(map.get("host").unwrap(), "svc.default.example.com");
        assert_eq!(map.len(), 2);

        headers.insert("bad header".to_string(), "v".to_string());
        assert!(matches!(
            header_map(&headers),
            Err(HttpError::InvalidHeaderName(name)) if name == "bad header"
        ));
    }

    #[test]
    fn test_parse_http_url() {
        assert!(parse_http_url("https://example.com/ready").is_ok());
        assert!(parse_http_url("ftp://example.com/").is_err());
    }

    #[test]
    fn test_build_client() {
        assert!(build_client(&HttpConfig::default()).is_ok());
    }
}
