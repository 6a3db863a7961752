//! End-to-end sweep against scripted collaborators
//!
//! Runs on the paused tokio clock, so a 60 second tier finishes instantly
//! and scale offsets are exact.

use scalewatch_config::ReportFormat;
use scalewatch_core::testing::{
    ChannelSignalSource, MemorySink, RecordingProvisioner, ScriptedLoadDriver, StaticProbe,
};
use scalewatch_core::{
    Collaborators, FailurePolicy, HarnessError, LoadTierConfig, ReportError, SuiteSettings,
    TargetEndpoint, TestCaseRecord, TierOrchestrator, TierPhase,
};
use scalewatch_output::{FanoutSink, FilesystemConfig, FilesystemSink, TemplateEngine};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const RESOURCE: &str = "autoscale-go";

fn tier(clients: u32) -> LoadTierConfig {
    LoadTierConfig::new(
        clients,
        10.0,
        Duration::from_secs(60),
        "http://10.0.0.1/?timeout=100",
    )
}

fn orchestrator(
    source: &ChannelSignalSource,
    driver: ScriptedLoadDriver,
    sink: Arc<dyn scalewatch_core::ReportSink>,
    failure_policy: FailurePolicy,
) -> TierOrchestrator {
    let settings = SuiteSettings {
        failure_policy,
        ..SuiteSettings::default()
    };
    TierOrchestrator::new(
        settings,
        Collaborators {
            provisioner: Arc::new(RecordingProvisioner::new(TargetEndpoint::new(
                RESOURCE,
                "http://10.0.0.1/?timeout=10",
            ))),
            probe: Arc::new(StaticProbe::ready()),
            signal_source: Arc::new(source.clone()),
            load_driver: Arc::new(driver),
            sink,
        },
    )
}

fn value(records: &[TestCaseRecord], name: &str) -> f32 {
    records
        .iter()
        .find(|r| r.name == name)
        .map(|r| r.value)
        .unwrap_or_else(|| panic!("missing record {}", name))
}

#[tokio::test(start_paused = true)]
async fn test_sweep_reports_scale_deltas_and_load_metrics() {
    let dir = TempDir::new().unwrap();
    let source = ChannelSignalSource::new();
    let memory = MemorySink::new();
    let files = FilesystemSink::new(
        FilesystemConfig {
            directory: dir.path().to_path_buf(),
            formats: vec![ReportFormat::Junit, ReportFormat::Json],
            path_template: "{{suite}}.{{ext}}".to_string(),
            overwrite: true,
            create_dirs: true,
        },
        TemplateEngine::new(),
    );
    let sink = FanoutSink::new()
        .with_sink(Arc::new(memory.clone()))
        .with_sink(Arc::new(files));

    let driver = ScriptedLoadDriver::new()
        .with_latency(Duration::from_millis(100))
        .with_signal(source.clone(), RESOURCE, 0)
        .scale_at(Duration::from_secs(5), 1)
        .scale_at(Duration::from_secs(20), 2);
    let orchestrator = orchestrator(&source, driver, Arc::new(sink), FailurePolicy::Abort);

    let outcome = orchestrator.run_suite(&[tier(10)]).await.unwrap();
    let records = &outcome.records;

    let names: Vec<&str> = records.iter().map(|r| r.metric()).collect();
    assert_eq!(
        names,
        vec![
            "requestCount",
            "requestedQPS",
            "actualQPS",
            "errorsPercentage",
            "scale-from-00-to-01(seconds)",
            "scale-from-01-to-02(seconds)",
            "p50(ms)",
            "p75(ms)",
            "p90(ms)",
            "p99(ms)",
            "p99.9(ms)",
        ]
    );

    assert_eq!(value(records, "clients-010/requestCount"), 6000.0);
    assert_eq!(value(records, "clients-010/requestedQPS"), 100.0);
    assert!((value(records, "clients-010/actualQPS") - 100.0).abs() < 1.0);
    assert!(value(records, "clients-010/errorsPercentage").abs() < f32::EPSILON);
    assert_eq!(value(records, "clients-010/scale-from-00-to-01(seconds)"), 5.0);
    assert_eq!(value(records, "clients-010/scale-from-01-to-02(seconds)"), 20.0);

    let percentiles: Vec<f32> = records
        .iter()
        .filter(|r| r.metric().starts_with('p'))
        .map(|r| r.value)
        .collect();
    assert!(percentiles.iter().all(|p| *p >= 100.0));
    assert!(percentiles.windows(2).all(|w| w[0] <= w[1]));

    let published = memory.published();
    assert_eq!(published.len(), 1);
    assert_eq!(&published[0].1, records);

    let xml = std::fs::read_to_string(dir.path().join("scale-by-load.xml")).unwrap();
    assert_eq!(xml.matches("<testcase ").count(), records.len());
    assert!(xml.contains("name=\"clients-010/scale-from-01-to-02(seconds)\""));
    assert!(dir.path().join("scale-by-load.json").exists());
}

#[tokio::test(start_paused = true)]
async fn test_scale_down_and_up_are_both_recorded_with_error_rate() {
    let source = ChannelSignalSource::new();
    let memory = MemorySink::new();
    let driver = ScriptedLoadDriver::new()
        .with_error_rate(0.025)
        .with_signal(source.clone(), RESOURCE, 1)
        .scale_at(Duration::from_secs(3), 3)
        .scale_at(Duration::from_secs(30), 2)
        .scale_at(Duration::from_secs(45), 4);
    let orchestrator = orchestrator(&source, driver, Arc::new(memory), FailurePolicy::Abort);

    let records = orchestrator.run_tier(&tier(20)).await.unwrap();
    assert_eq!(value(&records, "clients-020/requestCount"), 12000.0);
    assert!((value(&records, "clients-020/errorsPercentage") - 2.5).abs() < 1e-3);

    let deltas: Vec<(&str, f32)> = records
        .iter()
        .filter(|r| r.metric().starts_with("scale-from"))
        .map(|r| (r.metric(), r.value))
        .collect();

    assert_eq!(
        deltas,
        vec![
            ("scale-from-01-to-03(seconds)", 3.0),
            ("scale-from-03-to-02(seconds)", 30.0),
            ("scale-from-02-to-04(seconds)", 45.0),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_skip_tier_policy_continues_past_empty_tier() {
    let source = ChannelSignalSource::new();
    let memory = MemorySink::new();
    let driver = ScriptedLoadDriver::new()
        .with_signal(source.clone(), RESOURCE, 0)
        .scale_at(Duration::from_secs(5), 1)
        .empty_on_run(2);
    let orchestrator = orchestrator(
        &source,
        driver,
        Arc::new(memory.clone()),
        FailurePolicy::SkipTier,
    );

    let outcome = orchestrator
        .run_suite(&[tier(10), tier(20), tier(40)])
        .await
        .unwrap();

    assert_eq!(outcome.completed_tiers, vec!["clients-010", "clients-040"]);
    assert_eq!(outcome.failures.len(), 1);
    let failure = &outcome.failures[0];
    assert_eq!(failure.tier, "clients-020");
    assert_eq!(failure.phase, TierPhase::Report);
    assert!(matches!(
        failure.source,
        HarnessError::Report(ReportError::EmptyResult { .. })
    ));
    assert!(outcome.records.iter().all(|r| r.tier() != "clients-020"));

    // published once, with the surviving tiers
    let published = memory.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].1, outcome.records);
    assert_eq!(source.active_subscribers(), 0);
}
