//! `scalewatch run`

use anyhow::{anyhow, Context, Result};
use scalewatch_config::{parse_tiers, FailurePolicyConfig, ScaleWatchConfig};
use scalewatch_core::testing::{
    ChannelSignalSource, RecordingProvisioner, ScriptedLoadDriver, StaticProbe,
};
use scalewatch_core::{
    CapacitySignalSource, Collaborators, FailurePolicy, LoadTierConfig, ReportSink,
    SilentSignalSource, StaticTarget, SuiteError, SuiteSettings, TargetEndpoint, TierOrchestrator,
};
use scalewatch_http::{
    build_client, HttpConfig, HttpLoadDriver, HttpReadinessProbe, PollingSignalSource,
};
use scalewatch_output::build_sink;
use scalewatch_resilience::{CleanupRegistry, RunOutcome};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Command line settings that replace configured values
#[derive(Debug, Default)]
pub struct RunOverrides {
    pub tiers: Option<String>,
    pub target: Option<String>,
    pub duration: Option<u64>,
}

pub fn apply_overrides(config: &mut ScaleWatchConfig, overrides: &RunOverrides) -> Result<()> {
    if let Some(tiers) = &overrides.tiers {
        config.suite.concurrent_clients =
            parse_tiers(tiers).map_err(|e| anyhow!("Invalid --tiers: {}", e))?;
    }
    if let Some(target) = &overrides.target {
        config.target.url = target.clone();
    }
    if let Some(secs) = overrides.duration {
        config.suite.iteration_duration = Duration::from_secs(secs);
    }
    config
        .validate_all()
        .context("Configuration is invalid after applying command line overrides")
}

pub fn suite_settings(config: &ScaleWatchConfig) -> SuiteSettings {
    SuiteSettings {
        name: config.suite.name.clone(),
        failure_policy: match config.suite.failure_policy {
            FailurePolicyConfig::Abort => FailurePolicy::Abort,
            FailurePolicyConfig::SkipTier => FailurePolicy::SkipTier,
        },
        readiness_timeout: config.target.readiness_timeout,
        target_concurrency: config.suite.target_concurrency,
    }
}

pub fn load_tiers(config: &ScaleWatchConfig) -> Vec<LoadTierConfig> {
    config
        .suite
        .concurrent_clients
        .iter()
        .map(|&clients| {
            let mut tier = LoadTierConfig::new(
                clients,
                config.suite.qps_per_client,
                config.suite.iteration_duration,
                config.target.url.clone(),
            );
            tier.extra_headers = config.target.headers.clone();
            tier
        })
        .collect()
}

pub fn target_endpoint(config: &ScaleWatchConfig) -> TargetEndpoint {
    let probe_url = format!(
        "{}{}",
        config.target.url.trim_end_matches('/'),
        config.target.readiness_path
    );
    let endpoint = TargetEndpoint::new(config.signal.resource_name.clone(), probe_url);
    match &config.target.host_header {
        Some(host) => endpoint.with_host_header(host.clone()),
        None => endpoint,
    }
}

fn http_collaborators(
    config: &ScaleWatchConfig,
    sink: Arc<dyn ReportSink>,
) -> Result<Collaborators> {
    let client = build_client(&HttpConfig::from(&config.http))
        .context("Failed to build HTTP client")?;

    let mut driver = HttpLoadDriver::new(client.clone());
    if config.target.processing_delay_ms > 0 {
        driver = driver.with_processing_delay(
            config.target.delay_query_param.clone(),
            config.target.processing_delay_ms,
        );
    }

    let signal_source: Arc<dyn CapacitySignalSource> = match &config.signal.url {
        Some(url) => Arc::new(
            PollingSignalSource::new(client.clone(), url.clone())
                .with_poll_interval(config.signal.poll_interval_ms)
                .with_max_consecutive_failures(config.signal.max_consecutive_failures),
        ),
        None => {
            warn!("No signal.url configured; scale events will not be recorded");
            Arc::new(SilentSignalSource)
        }
    };

    Ok(Collaborators {
        provisioner: Arc::new(StaticTarget::new(target_endpoint(config))),
        probe: Arc::new(HttpReadinessProbe::new(client)),
        signal_source,
        load_driver: Arc::new(driver),
        sink,
    })
}

/// In-memory collaborators; the fake target scales 0 -> 1 -> 2 during
/// every tier
fn dry_run_collaborators(config: &ScaleWatchConfig, sink: Arc<dyn ReportSink>) -> Collaborators {
    let source = ChannelSignalSource::new();
    let duration = config.suite.iteration_duration;
    let driver = ScriptedLoadDriver::new()
        .with_latency(Duration::from_millis(config.target.processing_delay_ms))
        .with_signal(source.clone(), config.signal.resource_name.clone(), 0)
        .scale_at(duration / 12, 1)
        .scale_at(duration / 3, 2);

    Collaborators {
        provisioner: Arc::new(RecordingProvisioner::new(target_endpoint(config))),
        probe: Arc::new(StaticProbe::ready()),
        signal_source: Arc::new(source),
        load_driver: Arc::new(driver),
        sink,
    }
}

pub async fn run_command(config: ScaleWatchConfig, dry_run: bool) -> Result<()> {
    let sink: Arc<dyn ReportSink> =
        Arc::new(build_sink(&config.output).context("Failed to set up report output")?);

    let collaborators = if dry_run {
        info!("Dry run: using in-memory target, signal and load driver");
        dry_run_collaborators(&config, sink)
    } else {
        http_collaborators(&config, sink)?
    };

    let cleanup = CleanupRegistry::new();
    let orchestrator = TierOrchestrator::new(suite_settings(&config), collaborators)
        .with_percentiles(config.suite.percentiles.iter().copied())
        .with_cleanup_registry(cleanup.clone());
    let tiers = load_tiers(&config);

    info!(
        "Sweeping {} tiers ({:?} clients) at {} QPS per client against {}",
        tiers.len(),
        config.suite.concurrent_clients,
        config.suite.qps_per_client,
        config.target.url
    );

    let run = cleanup
        .run_until_interrupted(orchestrator.run_suite(&tiers))
        .await
        .context("Failed to listen for interrupt")?;
    let result = match run {
        RunOutcome::Completed(result) => result,
        RunOutcome::Interrupted(outcomes) => {
            let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
            return Err(anyhow!(
                "Interrupted; ran {} cleanups ({} failed)",
                outcomes.len(),
                failed
            ));
        }
    };

    match result {
        Ok(outcome) if outcome.failures.is_empty() => {
            info!(
                "Completed {} tiers, {} records published",
                outcome.completed_tiers.len(),
                outcome.records.len()
            );
            Ok(())
        }
        Ok(outcome) => {
            for failure in &outcome.failures {
                warn!("{}", failure);
            }
            Err(anyhow!(
                "{} of {} tiers failed",
                outcome.failures.len(),
                tiers.len()
            ))
        }
        Err(SuiteError::Aborted { failure, completed }) => Err(anyhow!(
            "Suite aborted: {} ({} records from completed tiers published)",
            failure,
            completed.len()
        )),
        Err(e) => Err(e).context("Suite failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scalewatch_config::ReportFormat;
    use tempfile::TempDir;

    fn config() -> ScaleWatchConfig {
        let mut config = ScaleWatchConfig::default();
        config.target.url = "http://10.0.0.1/".to_string();
        config.target.host_header = Some("autoscale-go.default.example.com".to_string());
        config.signal.resource_name = "autoscale-go".to_string();
        config
    }

    #[test]
    fn test_overrides() {
        let mut config = config();
        apply_overrides(
            &mut config,
            &RunOverrides {
                tiers: Some("5,15".to_string()),
                target: Some("http://10.0.0.9/".to_string()),
                duration: Some(2),
            },
        )
        .unwrap();

        assert_eq!(config.suite.concurrent_clients, vec![5, 15]);
        assert_eq!(config.target.url, "http://10.0.0.9/");
        assert_eq!(config.suite.iteration_duration, Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let mut config = config();
        let overrides = RunOverrides {
            tiers: Some("ten".to_string()),
            ..RunOverrides::default()
        };
        assert!(apply_overrides(&mut config, &overrides).is_err());
    }

    #[test]
    fn test_tiers_and_endpoint() {
        let config = config();
        let tiers = load_tiers(&config);
        assert_eq!(tiers.len(), config.suite.concurrent_clients.len());
        assert_eq!(tiers[0].label(), "clients-010");
        assert_eq!(tiers[0].requested_qps(), 100.0);

        let endpoint = target_endpoint(&config);
        assert_eq!(endpoint.probe_url, "http://10.0.0.1/?timeout=10");
        assert_eq!(endpoint.resource_name, "autoscale-go");
        assert_eq!(
            endpoint.host_header.as_deref(),
            Some("autoscale-go.default.example.com")
        );
    }

    #[test]
    fn test_suite_settings() {
        let mut config = config();
        config.suite.failure_policy = FailurePolicyConfig::SkipTier;
        let settings = suite_settings(&config);
        assert_eq!(settings.failure_policy, FailurePolicy::SkipTier);
        assert_eq!(settings.readiness_timeout, config.target.readiness_timeout);
    }

    #[tokio::test]
    async fn test_dry_run_writes_report() {
        let dir = TempDir::new().unwrap();
        let mut config = config();
        config.suite.concurrent_clients = vec![1];
        config.suite.iteration_duration = Duration::from_secs(1);
        config.output.directory = dir.path().to_path_buf();
        config.output.formats = vec![ReportFormat::Junit];
        config.output.stdout = false;

        run_command(config, true).await.unwrap();

        let xml = std::fs::read_to_string(dir.path().join("scale-by-load.xml")).unwrap();
        assert!(xml.contains("clients-001/requestCount"));
        assert!(xml.contains("clients-001/scale-from-00-to-01(seconds)"));
    }
}
