//! Prometheus export of escalation progress

use prometheus::{Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use surge_core::{ProgressEvent, ProgressSink};

/// Records every executed level into a Prometheus registry
pub struct PrometheusProgress {
    registry: Registry,
    throughput: GaugeVec,
    latency_avg: GaugeVec,
    latency_p95: GaugeVec,
    error_rate: GaugeVec,
    degradation_point: IntGaugeVec,
    skipped_levels: IntCounterVec,
    failed_levels: IntCounterVec,
}

impl PrometheusProgress {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let level_labels = &["endpoint", "connections"];

        let throughput = GaugeVec::new(
            Opts::new(
                "surge_level_throughput",
                "Average requests per second at a concurrency level",
            ),
            level_labels,
        )?;
        let latency_avg = GaugeVec::new(
            Opts::new("surge_level_latency_avg_ms", "Mean latency at a concurrency level"),
            level_labels,
        )?;
        let latency_p95 = GaugeVec::new(
            Opts::new(
                "surge_level_latency_p95_ms",
                "95th percentile latency at a concurrency level",
            ),
            level_labels,
        )?;
        let error_rate = GaugeVec::new(
            Opts::new("surge_level_error_rate", "Error rate at a concurrency level"),
            level_labels,
        )?;
        let degradation_point = IntGaugeVec::new(
            Opts::new("surge_degradation_point", "First concurrency level with degradation"),
            &["endpoint"],
        )?;
        let skipped_levels = IntCounterVec::new(
            Opts::new("surge_levels_skipped_total", "Ladder levels not executed"),
            &["endpoint"],
        )?;
        let failed_levels = IntCounterVec::new(
            Opts::new("surge_levels_failed_total", "Ladder levels aborted by the load engine"),
            &["endpoint"],
        )?;

        registry.register(Box::new(throughput.clone()))?;
        registry.register(Box::new(latency_avg.clone()))?;
        registry.register(Box::new(latency_p95.clone()))?;
        registry.register(Box::new(error_rate.clone()))?;
        registry.register(Box::new(degradation_point.clone()))?;
        registry.register(Box::new(skipped_levels.clone()))?;
        registry.register(Box::new(failed_levels.clone()))?;

        Ok(Self {
            registry,
            throughput,
            latency_avg,
            latency_p95,
            error_rate,
            degradation_point,
            skipped_levels,
            failed_levels,
        })
    }

    /// Text exposition of everything recorded so far
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl ProgressSink for PrometheusProgress {
    fn on_event(&self, event: &ProgressEvent<'_>) {
        match event {
            ProgressEvent::LevelCompleted {
                endpoint, sample, ..
            } => {
                let connections = sample.connections.to_string();
                let labels = [*endpoint, connections.as_str()];
                self.throughput.with_label_values(&labels).set(sample.throughput);
                self.latency_avg.with_label_values(&labels).set(sample.latency_avg_ms);
                self.latency_p95.with_label_values(&labels).set(sample.latency_p95_ms);
                self.error_rate.with_label_values(&labels).set(sample.error_rate);
            }
            ProgressEvent::LevelSkipped { endpoint, .. } => {
                self.skipped_levels.with_label_values(&[*endpoint]).inc();
            }
            ProgressEvent::LevelFailed { endpoint, .. } => {
                self.failed_levels.with_label_values(&[*endpoint]).inc();
            }
            ProgressEvent::WalkFinished { summary } => {
                if let Some(point) = summary.degradation_point {
                    self.degradation_point
                        .with_label_values(&[summary.name.as_str()])
                        .set(i64::from(point));
                }
            }
            ProgressEvent::WalkStarted { .. } | ProgressEvent::LevelStarted { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use surge_core::{Action, MetricsSample, SkipReason, Verdict};

    #[test]
    fn test_exports_level_gauges() {
        let progress = PrometheusProgress::new().unwrap();
        let sample = MetricsSample {
            connections: 50,
            throughput: 1234.5,
            latency_avg_ms: 12.0,
            latency_p95_ms: 30.0,
            error_rate: 0.01,
            status_code_counts: BTreeMap::new(),
            requests_total: 10_000,
            errors: 100,
            timeouts: 0,
        };
        let verdict = Verdict {
            signals: Vec::new(),
            first_degradation: false,
            action: Action::Continue,
        };

        progress.on_event(&ProgressEvent::LevelCompleted {
            endpoint: "health",
            sample: &sample,
            verdict: &verdict,
        });
        progress.on_event(&ProgressEvent::LevelSkipped {
            endpoint: "health",
            connections: 5000,
            reason: SkipReason::BeyondDegradation {
                degradation_point: 50,
                limit: 100.0,
            },
        });

        let text = progress.encode().unwrap();
        assert!(text
            .contains(r#"surge_level_throughput{connections="50",endpoint="health"} 1234.5"#));
        assert!(text.contains(r#"surge_levels_skipped_total{endpoint="health"} 1"#));
    }
}
