use scalewatch_logging::{init_logging_from_config, LogFormat, LogLevel, LoggingConfig};

#[test]
fn test_logging_config_integration() {
    let yaml_config = r#"
level: debug
format: json
include_location: true
filter: "hyper=warn,reqwest=warn"
"#;

    let config: LoggingConfig = serde_yaml::from_str(yaml_config).unwrap();

    assert_eq!(config.level, LogLevel::Debug);
    assert_eq!(config.format, LogFormat::Json);
    assert!(config.include_location);

    assert!(init_logging_from_config(&config).is_ok());
    tracing::info!(tier = "clients-010", "json logging initialised");

    // a second subscriber cannot be installed, but the call still succeeds
    let compact = LoggingConfig {
        format: LogFormat::Compact,
        ..LoggingConfig::default()
    };
    assert!(init_logging_from_config(&compact).is_ok());
}
