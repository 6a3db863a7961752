//! Logging setup for scalewatch
//!
//! Everything logs through `tracing`. Crates that log through `log` are
//! bridged by the subscriber installed here.

pub mod init;

pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing};
pub use scalewatch_config::{LogFormat, LogLevel, LoggingConfig};
