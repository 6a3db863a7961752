//! Domain-driven configuration for scalewatch
//!
//! Configuration is split by functional domain (suite, target, signal, http,
//! logging, output), each with its own defaults and validation, and can be
//! overridden through `SCALEWATCH_*` environment variables.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

pub use error::{ConfigError, ConfigResult};
pub use loader::{parse_tiers, ConfigLoader};
pub use validation::Validatable;

pub use domains::{
    http::HttpConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    output::{OutputConfig, ReportFormat},
    signal::SignalConfig,
    suite::{FailurePolicyConfig, SuiteConfig},
    target::TargetConfig,
    ScaleWatchConfig,
};

pub use domains::utils::serde_duration;
