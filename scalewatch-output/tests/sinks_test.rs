use scalewatch_config::{OutputConfig, ReportFormat};
use scalewatch_core::{Metric, ReportSink, SinkError, TestCaseRecord};
use scalewatch_output::{build_sink, FilesystemConfig, FilesystemSink, TemplateEngine};
use std::fs;
use tempfile::TempDir;

fn records() -> Vec<TestCaseRecord> {
    vec![
        TestCaseRecord::new("clients-010", Metric::RequestCount, 6000.0),
        TestCaseRecord::new("clients-010", Metric::RequestedQps, 100.0),
        TestCaseRecord::new("clients-010", Metric::ScaleDelta { from: 0, to: 1 }, 5.0),
    ]
}

fn sink(dir: &TempDir, formats: Vec<ReportFormat>, overwrite: bool) -> FilesystemSink {
    FilesystemSink::new(
        FilesystemConfig {
            directory: dir.path().join("artifacts"),
            formats,
            path_template: "{{suite}}.{{ext}}".to_string(),
            overwrite,
            create_dirs: true,
        },
        TemplateEngine::new(),
    )
}

#[tokio::test]
async fn test_writes_one_file_per_format() {
    let dir = TempDir::new().unwrap();
    let sink = sink(&dir, vec![ReportFormat::Junit, ReportFormat::Csv], true);

    let written = sink.write_reports("scale-by-load", &records()).await.unwrap();
    assert_eq!(written.len(), 2);

    let xml = fs::read_to_string(dir.path().join("artifacts/scale-by-load.xml")).unwrap();
    assert!(xml.contains("name=\"clients-010/scale-from-00-to-01(seconds)\""));
    assert_eq!(xml.matches("<testcase ").count(), 3);

    let csv = fs::read_to_string(dir.path().join("artifacts/scale-by-load.csv")).unwrap();
    assert_eq!(csv.lines().count(), 4);
}

#[tokio::test]
async fn test_refuses_to_overwrite_when_disabled() {
    let dir = TempDir::new().unwrap();
    let sink = sink(&dir, vec![ReportFormat::Json], false);

    sink.publish("scale-by-load", &records()).await.unwrap();
    let second = sink.publish("scale-by-load", &records()).await;
    assert!(matches!(second, Err(SinkError::Delivery { .. })));
}

#[tokio::test]
async fn test_overwrites_when_enabled() {
    let dir = TempDir::new().unwrap();
    let sink = sink(&dir, vec![ReportFormat::Json], true);

    sink.publish("scale-by-load", &records()).await.unwrap();
    sink.publish("scale-by-load", &records()[..1]).await.unwrap();

    let json: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join("artifacts/scale-by-load.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(json["records"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_build_sink_from_config() {
    let dir = TempDir::new().unwrap();
    let config = OutputConfig {
        directory: dir.path().to_path_buf(),
        formats: vec![ReportFormat::Junit],
        path_template: "junit_{{suite}}.{{ext}}".to_string(),
        stdout: false,
        overwrite: true,
    };

    let sink = build_sink(&config).unwrap();
    assert_eq!(sink.len(), 1);
    sink.publish("scale-by-load", &records()).await.unwrap();
    assert!(dir.path().join("junit_scale-by-load.xml").exists());
}

#[test]
fn test_build_sink_rejects_bad_template() {
    let config = OutputConfig {
        path_template: "{{suite".to_string(),
        ..OutputConfig::default()
    };
    assert!(build_sink(&config).is_err());
}
