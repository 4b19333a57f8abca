//! Escalation runner: walks one endpoint's concurrency ladder

use crate::config::EscalationConfig;
use crate::detector::EscalationState;
use crate::error::LoadError;
use crate::progress::{ProgressEvent, ProgressSink, TracingProgress};
use crate::summary::{EndpointSummary, WalkOutcome};
use crate::types::{AuthContext, EndpointSpec, LoadOutcome, LoadTarget, MetricsSample};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Capability that applies load to a target at a fixed concurrency
#[async_trait]
pub trait LoadEngine: Send + Sync {
    /// Hold `connections` concurrent connections against `target` for `duration`
    async fn run_load(
        &self,
        target: &LoadTarget,
        connections: u32,
        duration: Duration,
        timeout: Duration,
    ) -> Result<LoadOutcome, LoadError>;
}

#[async_trait]
impl<E: LoadEngine + ?Sized> LoadEngine for Arc<E> {
    async fn run_load(
        &self,
        target: &LoadTarget,
        connections: u32,
        duration: Duration,
        timeout: Duration,
    ) -> Result<LoadOutcome, LoadError> {
        (**self).run_load(target, connections, duration, timeout).await
    }
}

/// Drives the concurrency ladder for endpoints, one level at a time
pub struct EscalationRunner<E> {
    engine: E,
    base_url: String,
    config: EscalationConfig,
    auth: Option<AuthContext>,
    progress: Arc<dyn ProgressSink>,
}

impl<E: LoadEngine> EscalationRunner<E> {
    pub fn new(engine: E, base_url: impl Into<String>, config: EscalationConfig) -> Self {
        Self {
            engine,
            base_url: base_url.into(),
            config,
            auth: None,
            progress: Arc::new(TracingProgress),
        }
    }

    pub fn with_auth(mut self, auth: Option<AuthContext>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Walk every ladder level of `spec` and summarize the result.
    ///
    /// Engine failures end the walk; the samples collected so far are kept.
    pub async fn run_escalation(&self, spec: &EndpointSpec) -> EndpointSummary {
        let ladder = spec.effective_ladder();
        let target = spec.target(&self.base_url, self.auth.as_ref());
        let thresholds = &self.config.thresholds;

        self.progress.on_event(&ProgressEvent::WalkStarted {
            endpoint: &spec.name,
            levels: &ladder,
        });

        let mut state = EscalationState::new();
        let mut skipped_levels = Vec::new();
        let mut outcome = WalkOutcome::Completed;

        for &connections in &ladder {
            if let Some(reason) = state.skip_reason(connections, thresholds) {
                skipped_levels.push(connections);
                self.progress.on_event(&ProgressEvent::LevelSkipped {
                    endpoint: &spec.name,
                    connections,
                    reason,
                });
                continue;
            }

            self.progress.on_event(&ProgressEvent::LevelStarted {
                endpoint: &spec.name,
                connections,
            });

            let result = self
                .engine
                .run_load(
                    &target,
                    connections,
                    self.config.duration(),
                    self.config.timeout(),
                )
                .await;

            let load = match result {
                Ok(load) => load,
                Err(e) => {
                    let error = e.to_string();
                    self.progress.on_event(&ProgressEvent::LevelFailed {
                        endpoint: &spec.name,
                        connections,
                        error: &error,
                    });
                    outcome = WalkOutcome::Aborted {
                        level: connections,
                        error,
                    };
                    break;
                }
            };

            let sample = MetricsSample::from_outcome(connections, load);
            let verdict = state.observe(sample, thresholds);
            if let Some(sample) = state.samples.last() {
                self.progress.on_event(&ProgressEvent::LevelCompleted {
                    endpoint: &spec.name,
                    sample,
                    verdict: &verdict,
                });
            }

            if verdict.should_stop() {
                if let Some(threshold) = state.hard_stop() {
                    outcome = WalkOutcome::HardStopped { threshold };
                }
            }
        }

        debug!(
            endpoint = %spec.name,
            executed = state.samples.len(),
            skipped = skipped_levels.len(),
            "Ladder exhausted"
        );

        let summary = EndpointSummary::from_walk(spec, state, skipped_levels, outcome);
        self.progress
            .on_event(&ProgressEvent::WalkFinished { summary: &summary });
        summary
    }
}
