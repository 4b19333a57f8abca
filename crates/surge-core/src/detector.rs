//! Degradation detection
//!
//! The detector folds each new [`MetricsSample`] into a per-endpoint
//! [`EscalationState`] and decides whether the endpoint has degraded and
//! whether escalation must stop.
//!
//! ```text
//!   sample ──► throughput drop? ─┐
//!          ──► error rate?      ─┼─► first hit sets degradation_point (once)
//!          ──► latency?         ─┘
//!          ──► hard error rate? ──► error_rate_threshold (sticky)
//!          ──► hard latency?    ──► latency_threshold    (sticky)
//! ```

use crate::config::DetectorThresholds;
use crate::types::MetricsSample;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mutable state of one endpoint's escalation walk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EscalationState {
    /// Throughput of the last executed level, 0 before the first
    pub previous_throughput: f64,

    /// First level at which degradation was observed
    pub degradation_point: Option<u32>,

    /// Error rate crossed the hard-stop threshold
    pub error_rate_threshold: bool,

    /// Latency crossed the hard-stop threshold
    pub latency_threshold: bool,

    /// Executed samples, ascending by connections
    pub samples: Vec<MetricsSample>,
}

/// A single degradation rule that fired for a sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DegradationSignal {
    ThroughputDrop { previous: f64, current: f64 },
    HighErrorRate { error_rate: f64 },
    HighLatency { latency_avg_ms: f64 },
}

impl fmt::Display for DegradationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThroughputDrop { previous, current } => write!(
                f,
                "throughput dropped from {:.2} to {:.2} req/s",
                previous, current
            ),
            Self::HighErrorRate { error_rate } => {
                write!(f, "error rate {:.2}%", error_rate * 100.0)
            }
            Self::HighLatency { latency_avg_ms } => {
                write!(f, "average latency {:.2}ms", latency_avg_ms)
            }
        }
    }
}

/// Which sticky threshold stopped an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardStopKind {
    ErrorRate,
    Latency,
}

impl fmt::Display for HardStopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ErrorRate => f.write_str("error rate threshold exceeded"),
            Self::Latency => f.write_str("latency threshold exceeded"),
        }
    }
}

/// Why a ladder level was not executed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// A sticky threshold was set earlier in the walk
    HardStop { threshold: HardStopKind },

    /// Level exceeds `degradation_point * skip_ahead_multiplier`
    BeyondDegradation { degradation_point: u32, limit: f64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardStop { threshold } => write!(f, "{}", threshold),
            Self::BeyondDegradation {
                degradation_point,
                limit,
            } => write!(
                f,
                "beyond {:.0} connections (degraded at {})",
                limit, degradation_point
            ),
        }
    }
}

/// What the runner should do after a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Continue,
    StopEndpoint,
}

/// Detector output for one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Degradation rules that fired, in evaluation order
    pub signals: Vec<DegradationSignal>,

    /// This sample set the degradation point
    pub first_degradation: bool,

    pub action: Action,
}

impl Verdict {
    pub fn is_degraded(&self) -> bool {
        !self.signals.is_empty()
    }

    pub fn should_stop(&self) -> bool {
        self.action == Action::StopEndpoint
    }
}

impl EscalationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sticky threshold that is currently set, error rate first
    pub fn hard_stop(&self) -> Option<HardStopKind> {
        if self.error_rate_threshold {
            Some(HardStopKind::ErrorRate)
        } else if self.latency_threshold {
            Some(HardStopKind::Latency)
        } else {
            None
        }
    }

    /// Decide whether `level` should be skipped before it is run
    pub fn skip_reason(&self, level: u32, thresholds: &DetectorThresholds) -> Option<SkipReason> {
        if let Some(threshold) = self.hard_stop() {
            return Some(SkipReason::HardStop { threshold });
        }

        let degradation_point = self.degradation_point?;
        let limit = degradation_point as f64 * thresholds.skip_ahead_multiplier;
        if level as f64 > limit {
            Some(SkipReason::BeyondDegradation {
                degradation_point,
                limit,
            })
        } else {
            None
        }
    }

    /// Fold a freshly executed sample into the state
    pub fn observe(&mut self, sample: MetricsSample, thresholds: &DetectorThresholds) -> Verdict {
        let mut signals = Vec::new();

        if self.previous_throughput > 0.0
            && sample.throughput < self.previous_throughput * thresholds.throughput_drop_ratio
        {
            signals.push(DegradationSignal::ThroughputDrop {
                previous: self.previous_throughput,
                current: sample.throughput,
            });
        }
        if sample.error_rate > thresholds.degraded_error_rate {
            signals.push(DegradationSignal::HighErrorRate {
                error_rate: sample.error_rate,
            });
        }
        if sample.latency_avg_ms > thresholds.degraded_latency_ms {
            signals.push(DegradationSignal::HighLatency {
                latency_avg_ms: sample.latency_avg_ms,
            });
        }

        let first_degradation = !signals.is_empty() && self.degradation_point.is_none();
        if first_degradation {
            self.degradation_point = Some(sample.connections);
        }

        if sample.error_rate > thresholds.hard_stop_error_rate {
            self.error_rate_threshold = true;
        }
        if sample.latency_avg_ms > thresholds.hard_stop_latency_ms {
            self.latency_threshold = true;
        }

        self.previous_throughput = sample.throughput;
        self.samples.push(sample);

        let action = if self.hard_stop().is_some() {
            Action::StopEndpoint
        } else {
            Action::Continue
        };

        Verdict {
            signals,
            first_degradation,
            action,
        }
    }
}
