//! Full sweep over every configured endpoint

use std::sync::Arc;

use chrono::Utc;
use surge_core::{
    aggregate, AuthContext, EndpointSpec, EndpointSummary, EscalationRunner, LoadEngine,
    ProgressEvent, ProgressSink, StressConfig, SurgeError, TracingProgress,
};
use tracing::{info, warn};

use crate::auth;
use crate::engine::HttpLoadEngine;
use crate::report::StressReport;
use crate::validate::{EndpointValidator, HttpProbe};

/// Validates, escalates and aggregates a set of endpoints in sequence
pub struct StressSweep<E, V> {
    engine: E,
    validator: V,
    config: StressConfig,
    progress: Arc<dyn ProgressSink>,
    filter: Vec<String>,
}

impl<E: LoadEngine, V: EndpointValidator> StressSweep<E, V> {
    pub fn new(engine: E, validator: V, config: StressConfig) -> Self {
        Self {
            engine,
            validator,
            config,
            progress: Arc::new(TracingProgress),
            filter: Vec::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Restrict the sweep to the named endpoints; empty means all
    pub fn with_endpoint_filter(mut self, names: Vec<String>) -> Self {
        self.filter = names;
        self
    }

    /// Endpoints that will be tested, in configuration order
    pub fn selected_endpoints(&self) -> Vec<&EndpointSpec> {
        self.config
            .endpoints
            .iter()
            .filter(|spec| self.filter.is_empty() || self.filter.iter().any(|n| n == &spec.name))
            .collect()
    }

    /// Run the sweep. Endpoints failing validation are reported as skipped.
    pub async fn run(self, auth: Option<AuthContext>) -> StressReport {
        let started_at = Utc::now();
        let base_url = self.config.target.base_url.clone();
        let endpoints: Vec<EndpointSpec> = self.selected_endpoints().into_iter().cloned().collect();

        info!(
            base_url = %base_url,
            endpoints = endpoints.len(),
            authenticated = auth.is_some(),
            "Starting stress sweep"
        );

        let escalation = self.config.escalation.clone();
        let runner = EscalationRunner::new(self.engine, base_url.clone(), escalation)
            .with_auth(auth.clone())
            .with_progress(self.progress.clone());

        let mut summaries = Vec::with_capacity(endpoints.len());
        for spec in &endpoints {
            let target = spec.target(&base_url, auth.as_ref());
            if let Err(failure) = self.validator.validate(spec, &target).await {
                warn!(endpoint = %spec.name, "{}", failure);
                let summary = EndpointSummary::skipped(spec, failure.reason);
                self.progress
                    .on_event(&ProgressEvent::WalkFinished { summary: &summary });
                summaries.push(summary);
                continue;
            }

            summaries.push(runner.run_escalation(spec).await);
        }

        let system = aggregate(&summaries, &self.config.aggregation);
        let finished_at = Utc::now();

        info!(
            bottleneck = system.bottleneck.as_ref().map(|b| b.name.as_str()),
            ceiling = system.recommended_concurrency_ceiling,
            "Stress sweep finished"
        );

        StressReport {
            started_at,
            finished_at,
            base_url,
            duration_per_level_secs: self.config.escalation.duration_secs,
            endpoints: summaries,
            system,
        }
    }
}

/// Sweep a live server over HTTP, authenticating first when configured
pub async fn run_http(
    config: StressConfig,
    filter: Vec<String>,
    progress: Arc<dyn ProgressSink>,
) -> Result<StressReport, SurgeError> {
    config.validate()?;

    let engine = HttpLoadEngine::new()?;
    let client = engine.client().clone();
    let timeout = config.escalation.timeout();

    let auth = auth::bootstrap_or_continue(
        &client,
        &config.target.base_url,
        config.auth.as_ref(),
        timeout,
    )
    .await;

    let probe = HttpProbe::new(client, timeout);
    let report = StressSweep::new(engine, probe, config)
        .with_progress(progress)
        .with_endpoint_filter(filter)
        .run(auth)
        .await;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::AcceptAll;
    use async_trait::async_trait;
    use std::time::Duration;
    use surge_core::{LoadError, LoadOutcome, LoadTarget};

    struct IdleEngine;

    #[async_trait]
    impl LoadEngine for IdleEngine {
        async fn run_load(
            &self,
            _target: &LoadTarget,
            _connections: u32,
            _duration: Duration,
            _timeout: Duration,
        ) -> Result<LoadOutcome, LoadError> {
            Ok(LoadOutcome {
                requests_total: 100,
                throughput_avg: 10.0,
                latency_avg_ms: 5.0,
                latency_p95_ms: 8.0,
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_endpoint_filter() {
        let sweep = StressSweep::new(IdleEngine, AcceptAll, StressConfig::default())
            .with_endpoint_filter(vec!["weather".into(), "health".into(), "missing".into()]);

        let names: Vec<&str> = sweep
            .selected_endpoints()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["health", "weather"]);
    }

    #[test]
    fn test_no_filter_selects_all() {
        let config = StressConfig::default();
        let total = config.endpoints.len();
        let sweep = StressSweep::new(IdleEngine, AcceptAll, config);
        assert_eq!(sweep.selected_endpoints().len(), total);
    }
}
