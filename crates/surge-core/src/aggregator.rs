//! System-wide bottleneck analysis over endpoint summaries

use crate::config::AggregationConfig;
use crate::summary::EndpointSummary;
use serde::{Deserialize, Serialize};

/// Endpoint that degraded at the lowest concurrency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bottleneck {
    pub name: String,
    pub path: String,
    pub degradation_point: u32,
}

/// Endpoint ranked by peak throughput
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPerformer {
    pub name: String,
    pub path: String,
    pub max_throughput: f64,
    pub optimal_connections: Option<u32>,
}

/// Aggregate findings across all endpoints of a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemReport {
    pub bottleneck: Option<Bottleneck>,

    /// floor(bottleneck * safe_margin), only with a bottleneck
    pub recommended_concurrency_ceiling: Option<u32>,

    /// Highest level executed anywhere, only without a bottleneck
    pub max_tested_connections: Option<u32>,

    pub top_performers: Vec<TopPerformer>,
    pub recommendations: Vec<String>,
}

impl SystemReport {
    pub fn has_bottleneck(&self) -> bool {
        self.bottleneck.is_some()
    }
}

/// Combine endpoint summaries into a system report
pub fn aggregate(summaries: &[EndpointSummary], config: &AggregationConfig) -> SystemReport {
    // min_by_key keeps the first of equal minimums
    let bottleneck = summaries
        .iter()
        .filter_map(|s| s.degradation_point.map(|d| (s, d)))
        .min_by_key(|&(_, d)| d)
        .map(|(s, d)| Bottleneck {
            name: s.name.clone(),
            path: s.path.clone(),
            degradation_point: d,
        });

    let recommended_concurrency_ceiling = bottleneck
        .as_ref()
        .map(|b| safe_ceiling(b.degradation_point, config.safe_margin));

    let max_tested_connections = match bottleneck {
        Some(_) => None,
        None => summaries
            .iter()
            .filter_map(EndpointSummary::max_tested_connections)
            .max(),
    };

    SystemReport {
        bottleneck,
        recommended_concurrency_ceiling,
        max_tested_connections,
        top_performers: top_performers(summaries, config.top_n),
        recommendations: recommendations(summaries, config),
    }
}

/// floor(degradation_point * margin)
pub fn safe_ceiling(degradation_point: u32, margin: f64) -> u32 {
    (degradation_point as f64 * margin).floor() as u32
}

fn top_performers(summaries: &[EndpointSummary], top_n: usize) -> Vec<TopPerformer> {
    let mut ranked: Vec<&EndpointSummary> =
        summaries.iter().filter(|s| !s.samples.is_empty()).collect();
    // stable sort keeps input order on equal throughput
    ranked.sort_by(|a, b| b.max_throughput.total_cmp(&a.max_throughput));

    ranked
        .into_iter()
        .take(top_n)
        .map(|s| TopPerformer {
            name: s.name.clone(),
            path: s.path.clone(),
            max_throughput: s.max_throughput,
            optimal_connections: s.optimal_connections,
        })
        .collect()
}

fn recommendations(summaries: &[EndpointSummary], config: &AggregationConfig) -> Vec<String> {
    let degraded: Vec<&EndpointSummary> = summaries.iter().filter(|s| s.is_degraded()).collect();
    if degraded.is_empty() {
        return Vec::new();
    }

    let mut advice: Vec<String> = config
        .markers
        .iter()
        .filter(|m| degraded.iter().any(|s| s.path.contains(m.marker.as_str())))
        .map(|m| m.advice.clone())
        .collect();
    advice.push(config.general_advice.clone());
    advice
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::EscalationState;
    use crate::summary::WalkOutcome;
    use crate::types::{EndpointSpec, MetricsSample};
    use std::collections::BTreeMap;

    fn summary(
        name: &str,
        path: &str,
        degradation_point: Option<u32>,
        levels: &[(u32, f64)],
    ) -> EndpointSummary {
        let samples = levels
            .iter()
            .map(|&(connections, throughput)| MetricsSample {
                connections,
                throughput,
                latency_avg_ms: 10.0,
                latency_p95_ms: 20.0,
                error_rate: 0.0,
                status_code_counts: BTreeMap::new(),
                requests_total: 100,
                errors: 0,
                timeouts: 0,
            })
            .collect();
        let state = EscalationState {
            degradation_point,
            samples,
            ..Default::default()
        };
        let spec = EndpointSpec::new(name, path);
        EndpointSummary::from_walk(&spec, state, Vec::new(), WalkOutcome::Completed)
    }

    #[test]
    fn test_bottleneck_is_lowest_degradation_point() {
        let summaries = vec![
            summary("products", "/api/products", Some(500), &[(250, 900.0), (500, 600.0)]),
            summary("checkout", "/api/checkout", Some(200), &[(100, 400.0), (200, 200.0)]),
        ];

        let report = aggregate(&summaries, &AggregationConfig::default());
        let bottleneck = report.bottleneck.as_ref().unwrap();
        assert_eq!(bottleneck.name, "checkout");
        assert_eq!(bottleneck.degradation_point, 200);
        assert_eq!(report.recommended_concurrency_ceiling, Some(140));
        assert_eq!(report.max_tested_connections, None);
    }

    #[test]
    fn test_bottleneck_tie_keeps_first() {
        let summaries = vec![
            summary("a", "/a", Some(100), &[(100, 10.0)]),
            summary("b", "/b", Some(100), &[(100, 10.0)]),
        ];

        let report = aggregate(&summaries, &AggregationConfig::default());
        assert_eq!(report.bottleneck.unwrap().name, "a");
    }

    #[test]
    fn test_no_bottleneck_reports_max_tested() {
        let summaries = vec![
            summary("health", "/api/health", None, &[(10, 100.0), (5000, 4000.0)]),
            summary("users", "/api/users", None, &[(10, 90.0), (2000, 1500.0)]),
        ];

        let report = aggregate(&summaries, &AggregationConfig::default());
        assert!(!report.has_bottleneck());
        assert_eq!(report.recommended_concurrency_ceiling, None);
        assert_eq!(report.max_tested_connections, Some(5000));
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_ceiling_uses_configured_margin() {
        assert_eq!(safe_ceiling(200, 0.7), 140);
        assert_eq!(safe_ceiling(25, 0.7), 17);
        assert_eq!(safe_ceiling(25, 0.5), 12);
        assert_eq!(safe_ceiling(10, 1.0), 10);
    }

    #[test]
    fn test_top_performers() {
        let summaries = vec![
            summary("a", "/a", None, &[(10, 100.0)]),
            summary("b", "/b", None, &[(10, 400.0)]),
            summary("c", "/c", None, &[(10, 300.0)]),
            summary("d", "/d", None, &[(10, 400.0)]),
            summary("e", "/e", None, &[]),
        ];

        let report = aggregate(&summaries, &AggregationConfig::default());
        let names: Vec<&str> = report.top_performers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b", "d", "c"]);
    }

    #[test]
    fn test_top_performers_fewer_than_three() {
        let summaries = vec![summary("only", "/only", None, &[(10, 50.0)])];
        let report = aggregate(&summaries, &AggregationConfig::default());
        assert_eq!(report.top_performers.len(), 1);
    }

    #[test]
    fn test_recommendations_for_degraded_markers() {
        let summaries = vec![
            summary("cpu", "/api/cpu-intensive", Some(50), &[(50, 10.0)]),
            summary("db", "/api/db-intensive", Some(100), &[(100, 10.0)]),
            summary("db-2", "/api/db-intensive/report", Some(250), &[(250, 10.0)]),
            summary("memory", "/api/memory-intensive", None, &[(100, 10.0)]),
        ];

        let config = AggregationConfig::default();
        let report = aggregate(&summaries, &config);
        assert_eq!(
            report.recommendations,
            vec![
                config.markers[0].advice.clone(),
                config.markers[2].advice.clone(),
                config.general_advice.clone(),
            ]
        );
    }

    #[test]
    fn test_general_advice_without_marker_match() {
        let summaries = vec![summary("users", "/api/users", Some(1000), &[(1000, 10.0)])];
        let config = AggregationConfig::default();
        let report = aggregate(&summaries, &config);
        assert_eq!(report.recommendations, vec![config.general_advice.clone()]);
    }

    #[test]
    fn test_empty_input() {
        let report = aggregate(&[], &AggregationConfig::default());
        assert_eq!(report.bottleneck, None);
        assert_eq!(report.max_tested_connections, None);
        assert!(report.top_performers.is_empty());
        assert!(report.recommendations.is_empty());
    }
}
