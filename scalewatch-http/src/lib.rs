//! HTTP collaborators for scalewatch
//!
//! This crate provides the reqwest-backed load driver, the readiness probe
//! and the polling capacity signal source, all built from the shared HTTP
//! client configuration.

pub mod client;
pub mod config;
pub mod driver;
pub mod errors;
pub mod probe;
pub mod signal;

// Re-export main types for convenience
pub use client::{build_client, header_map, with_query_param};
pub use config::HttpConfig;
pub use driver::HttpLoadDriver;
pub use errors::HttpError;
pub use probe::HttpReadinessProbe;
pub use signal::{parse_capacity, PollingSignalSource, ResourceCapacity};
