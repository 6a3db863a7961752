use anyhow::Result;
use scalewatch_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Initialize logging from configuration
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(config);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    // try_init so a second initialisation (tests, embedding) is not fatal
    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Directives for the configured level plus any extra filter directives,
/// falling back to `RUST_LOG` and then `info` when they do not parse.
pub fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    let mut directives = config.level.as_str().to_string();
    if let Some(extra) = &config.filter {
        directives.push(',');
        directives.push_str(extra);
    }

    EnvFilter::try_new(&directives)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scalewatch_config::LogLevel;

    #[test]
    fn test_filter_includes_level_and_directives() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            filter: Some("scalewatch_core=trace".to_string()),
            ..LoggingConfig::default()
        };
        let rendered = build_env_filter(&config).to_string();
        assert!(rendered.contains("warn"));
        assert!(rendered.contains("scalewatch_core=trace"));
    }

    #[test]
    fn test_repeated_init_is_harmless() {
        assert!(init_simple_tracing("debug").is_ok());
        assert!(init_logging_from_config(&LoggingConfig::default()).is_ok());
    }
}
