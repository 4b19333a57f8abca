//! Progress events emitted during escalation walks

use crate::detector::{SkipReason, Verdict};
use crate::summary::{EndpointSummary, WalkOutcome};
use crate::types::MetricsSample;
use std::sync::Arc;
use tracing::{info, warn};

/// Something that happened during a walk
#[derive(Debug, Clone)]
pub enum ProgressEvent<'a> {
    WalkStarted {
        endpoint: &'a str,
        levels: &'a [u32],
    },
    LevelStarted {
        endpoint: &'a str,
        connections: u32,
    },
    LevelCompleted {
        endpoint: &'a str,
        sample: &'a MetricsSample,
        verdict: &'a Verdict,
    },
    LevelSkipped {
        endpoint: &'a str,
        connections: u32,
        reason: SkipReason,
    },
    LevelFailed {
        endpoint: &'a str,
        connections: u32,
        error: &'a str,
    },
    WalkFinished {
        summary: &'a EndpointSummary,
    },
}

/// Observer of walk progress
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: &ProgressEvent<'_>);
}

/// Discards all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_event(&self, _event: &ProgressEvent<'_>) {}
}

/// Logs events through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn on_event(&self, event: &ProgressEvent<'_>) {
        match event {
            ProgressEvent::WalkStarted { endpoint, levels } => {
                info!(endpoint, levels = levels.len(), "Starting escalation walk");
            }
            ProgressEvent::LevelStarted {
                endpoint,
                connections,
            } => {
                info!(endpoint, connections, "Testing concurrency level");
            }
            ProgressEvent::LevelCompleted {
                endpoint,
                sample,
                verdict,
            } => {
                info!(
                    endpoint,
                    connections = sample.connections,
                    throughput = sample.throughput,
                    latency_avg_ms = sample.latency_avg_ms,
                    latency_p95_ms = sample.latency_p95_ms,
                    error_rate = sample.error_rate,
                    "Level complete"
                );
                for signal in &verdict.signals {
                    warn!(endpoint, connections = sample.connections, "Degradation: {}", signal);
                }
                if verdict.should_stop() {
                    warn!(
                        endpoint,
                        connections = sample.connections,
                        "Hard threshold reached, stopping endpoint"
                    );
                }
            }
            ProgressEvent::LevelSkipped {
                endpoint,
                connections,
                reason,
            } => {
                info!(endpoint, connections, "Skipping level: {}", reason);
            }
            ProgressEvent::LevelFailed {
                endpoint,
                connections,
                error,
            } => {
                warn!(endpoint, connections, error, "Load engine failed, aborting walk");
            }
            ProgressEvent::WalkFinished { summary } => match &summary.outcome {
                WalkOutcome::Skipped { reason } => {
                    warn!(endpoint = %summary.name, "Endpoint skipped: {}", reason);
                }
                _ => info!(
                    endpoint = %summary.name,
                    samples = summary.samples.len(),
                    degradation_point = ?summary.degradation_point,
                    optimal_connections = ?summary.optimal_connections,
                    max_throughput = summary.max_throughput,
                    "Escalation walk finished"
                ),
            },
        }
    }
}

/// Forwards each event to several sinks in order
#[derive(Clone, Default)]
pub struct FanoutProgress {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl FanoutProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ProgressSink for FanoutProgress {
    fn on_event(&self, event: &ProgressEvent<'_>) {
        for sink in &self.sinks {
            sink.on_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Counting(Mutex<usize>);

    impl ProgressSink for Counting {
        fn on_event(&self, _event: &ProgressEvent<'_>) {
            *self.0.lock() += 1;
        }
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(Counting::default());
        let b = Arc::new(Counting::default());
        let fanout = FanoutProgress::new()
            .with(a.clone())
            .with(b.clone())
            .with(Arc::new(NoopProgress));
        assert_eq!(fanout.len(), 3);

        let event = ProgressEvent::LevelStarted {
            endpoint: "health",
            connections: 10,
        };
        fanout.on_event(&event);
        fanout.on_event(&event);

        assert_eq!(*a.0.lock(), 2);
        assert_eq!(*b.0.lock(), 2);
    }
}
