//! Sweep orchestration with scripted engines and validators

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use surge_core::{
    EndpointSpec, EscalationConfig, FanoutProgress, LoadEngine, LoadError, LoadOutcome,
    LoadTarget, NoopProgress, StressConfig, ValidationFailure, WalkOutcome,
};
use surge_loadtest::{AcceptAll, EndpointValidator, PrometheusProgress, StressReport, StressSweep};

/// Engine whose behavior depends only on the endpoint URL and level
struct ScriptedEngine {
    calls: Mutex<Vec<(String, u32)>>,
}

impl ScriptedEngine {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LoadEngine for ScriptedEngine {
    async fn run_load(
        &self,
        target: &LoadTarget,
        connections: u32,
        _duration: Duration,
        _timeout: Duration,
    ) -> Result<LoadOutcome, LoadError> {
        self.calls.lock().push((target.url.clone(), connections));

        // /api/db drops throughput at 100 and its connection pool dies at 150
        if target.url.ends_with("/api/db") && connections >= 150 {
            return Err(LoadError::Transport("connection reset by peer".to_string()));
        }
        let throughput = if target.url.ends_with("/api/db") && connections >= 100 {
            300.0
        } else {
            f64::from(connections) * 10.0
        };

        let requests = (throughput * 10.0) as u64;
        Ok(LoadOutcome {
            requests_total: requests,
            throughput_avg: throughput,
            latency_avg_ms: 20.0,
            latency_p95_ms: 40.0,
            errors: 0,
            timeouts: 0,
            status_code_counts: BTreeMap::from([(200, requests)]),
        })
    }
}

/// Rejects the endpoints named at construction
struct RejectNamed(Vec<&'static str>);

#[async_trait]
impl EndpointValidator for RejectNamed {
    async fn validate(
        &self,
        spec: &EndpointSpec,
        _target: &LoadTarget,
    ) -> Result<(), ValidationFailure> {
        if self.0.contains(&spec.name.as_str()) {
            Err(ValidationFailure::new(&spec.name, "missing field `items`"))
        } else {
            Ok(())
        }
    }
}

fn config() -> StressConfig {
    StressConfig {
        escalation: EscalationConfig {
            duration_secs: 1,
            ..EscalationConfig::default()
        },
        endpoints: vec![
            EndpointSpec::new("health", "/api/health").with_ladder(vec![10, 50]),
            EndpointSpec::new("db", "/api/db").with_ladder(vec![10, 50, 100, 150, 500]),
            EndpointSpec::new("products", "/api/products").with_ladder(vec![10, 50]),
        ],
        ..StressConfig::default()
    }
}

#[tokio::test]
async fn test_sweep_skips_invalid_and_keeps_partial_results() {
    let engine = Arc::new(ScriptedEngine::new());
    let report = StressSweep::new(engine.clone(), RejectNamed(vec!["products"]), config())
        .with_progress(Arc::new(NoopProgress))
        .run(None)
        .await;

    assert_eq!(report.endpoints.len(), 3);

    let health = &report.endpoints[0];
    assert_eq!(health.outcome, WalkOutcome::Completed);
    assert_eq!(health.degradation_point, None);
    assert_eq!(health.optimal_connections, Some(50));

    // 50 -> 100 drops from 500 to 300 req/s, then the engine fails at 150
    let db = &report.endpoints[1];
    assert_eq!(db.degradation_point, Some(100));
    assert_eq!(db.samples.len(), 3);
    assert!(matches!(db.outcome, WalkOutcome::Aborted { level: 150, .. }));

    let products = &report.endpoints[2];
    assert!(matches!(
        &products.outcome,
        WalkOutcome::Skipped { reason } if reason.contains("items")
    ));

    // a rejected endpoint never reaches the engine
    let calls = engine.calls.lock();
    assert!(calls.iter().all(|(url, _)| !url.ends_with("/api/products")));

    let bottleneck = report.system.bottleneck.as_ref().unwrap();
    assert_eq!(bottleneck.name, "db");
    assert_eq!(report.system.recommended_concurrency_ceiling, Some(70));
}

#[tokio::test]
async fn test_sweep_endpoint_filter() {
    let engine = Arc::new(ScriptedEngine::new());
    let report = StressSweep::new(engine.clone(), AcceptAll, config())
        .with_progress(Arc::new(NoopProgress))
        .with_endpoint_filter(vec!["health".to_string()])
        .run(None)
        .await;

    assert_eq!(report.endpoints.len(), 1);
    assert_eq!(report.endpoints[0].name, "health");
    assert!(!report.system.has_bottleneck());
    assert_eq!(report.system.max_tested_connections, Some(50));
    assert_eq!(engine.calls.lock().len(), 2);
}

#[tokio::test]
async fn test_sweep_feeds_prometheus() {
    let prometheus = Arc::new(PrometheusProgress::new().unwrap());
    let progress = FanoutProgress::new()
        .with(Arc::new(NoopProgress))
        .with(prometheus.clone());

    StressSweep::new(ScriptedEngine::new(), AcceptAll, config())
        .with_progress(Arc::new(progress))
        .run(None)
        .await;

    let text = prometheus.encode().unwrap();
    assert!(text.contains(r#"surge_degradation_point{endpoint="db"} 100"#));
    assert!(text.contains(r#"surge_levels_failed_total{endpoint="db"} 1"#));
    assert!(text.contains(r#"surge_level_throughput{connections="50",endpoint="health"} 500"#));
}

#[tokio::test]
async fn test_report_persists_to_json() {
    let report = StressSweep::new(ScriptedEngine::new(), AcceptAll, config())
        .with_progress(Arc::new(NoopProgress))
        .run(None)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    report.save_json(&path).unwrap();

    let loaded = StressReport::load_json(&path).unwrap();
    assert_eq!(loaded, report);
    assert_eq!(loaded.system.bottleneck.map(|b| b.degradation_point), Some(100));
}
