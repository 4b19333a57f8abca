//! # Surge Core
//!
//! Concurrency escalation and degradation detection for HTTP stress tests.
//!
//! An escalation walk raises the number of concurrent connections against one
//! endpoint step by step, watches throughput, latency and error rate, and stops
//! once the endpoint has clearly degraded. Per-endpoint findings are then folded
//! into a system-wide bottleneck analysis.
//!
//! ```text
//!   EndpointSpec ──► EscalationRunner ──► LoadEngine (black box)
//!                          │                    │
//!                          │◄── MetricsSample ──┘
//!                          ▼
//!                   EscalationState::observe ──► Verdict
//!                          │
//!                          ▼
//!                   EndpointSummary ──► aggregate ──► SystemReport
//! ```
//!
//! Load generation itself is injected through the [`LoadEngine`] trait; this
//! crate performs no network I/O.

pub mod aggregator;
pub mod config;
pub mod detector;
pub mod error;
pub mod escalation;
pub mod progress;
pub mod summary;
pub mod types;

pub use aggregator::{aggregate, safe_ceiling, Bottleneck, SystemReport, TopPerformer};
pub use config::*;
pub use detector::*;
pub use error::*;
pub use escalation::{EscalationRunner, LoadEngine};
pub use progress::*;
pub use summary::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aggregator::{aggregate, SystemReport};
    pub use crate::config::{AggregationConfig, DetectorThresholds, EscalationConfig, StressConfig};
    pub use crate::detector::{EscalationState, Verdict};
    pub use crate::error::{LoadError, SurgeError, ValidationFailure};
    pub use crate::escalation::{EscalationRunner, LoadEngine};
    pub use crate::progress::{ProgressEvent, ProgressSink};
    pub use crate::summary::{EndpointSummary, WalkOutcome};
    pub use crate::types::{AuthContext, EndpointSpec, LoadOutcome, LoadTarget, MetricsSample};
}
