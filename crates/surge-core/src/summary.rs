//! Per-endpoint results of an escalation walk

use crate::detector::{EscalationState, HardStopKind};
use crate::types::{EndpointSpec, HttpMethod, MetricsSample};
use serde::{Deserialize, Serialize};

/// How an endpoint's walk ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WalkOutcome {
    /// Every ladder level was executed or skipped by the skip-ahead rule
    Completed,

    /// A sticky threshold ended the walk early
    HardStopped { threshold: HardStopKind },

    /// The load engine failed at `level`; samples before it are kept
    Aborted { level: u32, error: String },

    /// The endpoint was never escalated
    Skipped { reason: String },
}

/// Immutable summary of one endpoint's walk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSummary {
    pub name: String,
    pub path: String,
    pub method: HttpMethod,
    pub description: String,
    pub degradation_point: Option<u32>,
    /// Level with the highest throughput, first one on ties
    pub optimal_connections: Option<u32>,
    pub max_throughput: f64,
    pub samples: Vec<MetricsSample>,
    pub skipped_levels: Vec<u32>,
    pub outcome: WalkOutcome,
}

impl EndpointSummary {
    /// Fold a finished walk into a summary
    pub fn from_walk(
        spec: &EndpointSpec,
        state: EscalationState,
        skipped_levels: Vec<u32>,
        outcome: WalkOutcome,
    ) -> Self {
        let (optimal_connections, max_throughput) = optimal_level(&state.samples);

        Self {
            name: spec.name.clone(),
            path: spec.path.clone(),
            method: spec.method,
            description: spec.description.clone(),
            degradation_point: state.degradation_point,
            optimal_connections,
            max_throughput,
            samples: state.samples,
            skipped_levels,
            outcome,
        }
    }

    /// Summary for an endpoint that was not escalated at all
    pub fn skipped(spec: &EndpointSpec, reason: impl Into<String>) -> Self {
        Self::from_walk(
            spec,
            EscalationState::new(),
            Vec::new(),
            WalkOutcome::Skipped {
                reason: reason.into(),
            },
        )
    }

    pub fn is_degraded(&self) -> bool {
        self.degradation_point.is_some()
    }

    /// Highest concurrency level actually executed
    pub fn max_tested_connections(&self) -> Option<u32> {
        self.samples.iter().map(|s| s.connections).max()
    }
}

/// First level reaching the maximum throughput, and that throughput
fn optimal_level(samples: &[MetricsSample]) -> (Option<u32>, f64) {
    let mut best: Option<&MetricsSample> = None;
    for sample in samples {
        match best {
            Some(current) if sample.throughput <= current.throughput => {}
            _ => best = Some(sample),
        }
    }

    match best {
        Some(sample) => (Some(sample.connections), sample.throughput),
        None => (None, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorThresholds;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn sample(connections: u32, throughput: f64) -> MetricsSample {
        MetricsSample {
            connections,
            throughput,
            latency_avg_ms: 10.0,
            latency_p95_ms: 15.0,
            error_rate: 0.0,
            status_code_counts: BTreeMap::new(),
            requests_total: 100,
            errors: 0,
            timeouts: 0,
        }
    }

    fn walk(levels: &[(u32, f64)]) -> EscalationState {
        let thresholds = DetectorThresholds::default();
        let mut state = EscalationState::new();
        for &(c, t) in levels {
            state.observe(sample(c, t), &thresholds);
        }
        state
    }

    #[test]
    fn test_optimal_connections() {
        let spec = EndpointSpec::new("users", "/api/users");
        let state = walk(&[(10, 100.0), (25, 105.0), (50, 102.0)]);

        let summary = EndpointSummary::from_walk(&spec, state, Vec::new(), WalkOutcome::Completed);
        assert_eq!(summary.degradation_point, None);
        assert_eq!(summary.optimal_connections, Some(25));
        assert_eq!(summary.max_throughput, 105.0);
        assert_eq!(summary.max_tested_connections(), Some(50));
    }

    #[test]
    fn test_optimal_connections_tie_takes_first() {
        let spec = EndpointSpec::new("users", "/api/users");
        let state = walk(&[(10, 90.0), (25, 120.0), (50, 120.0), (100, 110.0)]);

        let summary = EndpointSummary::from_walk(&spec, state, Vec::new(), WalkOutcome::Completed);
        assert_eq!(summary.optimal_connections, Some(25));
    }

    #[test]
    fn test_all_zero_throughput_takes_first_level() {
        let spec = EndpointSpec::new("down", "/api/down");
        let state = walk(&[(10, 0.0), (25, 0.0)]);

        let summary = EndpointSummary::from_walk(&spec, state, Vec::new(), WalkOutcome::Completed);
        assert_eq!(summary.optimal_connections, Some(10));
        assert_eq!(summary.max_throughput, 0.0);
    }

    #[test]
    fn test_skipped_summary_is_empty() {
        let spec = EndpointSpec::new("health", "/api/health").with_description("Health check");
        let summary = EndpointSummary::skipped(&spec, "missing field `status`");

        assert!(summary.samples.is_empty());
        assert_eq!(summary.degradation_point, None);
        assert_eq!(summary.optimal_connections, None);
        assert_eq!(summary.max_throughput, 0.0);
        assert_eq!(summary.description, "Health check");
        assert!(matches!(summary.outcome, WalkOutcome::Skipped { .. }));
    }

    proptest! {
        #[test]
        fn prop_optimal_is_smallest_argmax(throughputs in prop::collection::vec(0u32..5, 1..12)) {
            let levels: Vec<(u32, f64)> = throughputs
                .iter()
                .enumerate()
                .map(|(i, &t)| ((i as u32 + 1) * 10, t as f64 * 100.0))
                .collect();
            let spec = EndpointSpec::new("p", "/p");
            let outcome = WalkOutcome::Completed;
            let summary = EndpointSummary::from_walk(&spec, walk(&levels), Vec::new(), outcome);

            let max = levels.iter().map(|&(_, t)| t).fold(f64::MIN, f64::max);
            let expected = levels.iter().find(|&&(_, t)| t == max).map(|&(c, _)| c);
            prop_assert_eq!(summary.optimal_connections, expected);
            prop_assert_eq!(summary.max_throughput, max);
        }
    }
}
