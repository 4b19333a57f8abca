//! # Surge Load Testing
//!
//! Drives escalation walks against a live HTTP server.
//!
//! ## Features
//!
//! - **HTTP Load Engine**: closed-loop workers, one per concurrent connection
//! - **HDR Histograms**: mean and p95 latency per concurrency level
//! - **Auth Bootstrap**: one login before the sweep, bearer token reused
//! - **Response Validation**: one probe request before each endpoint is loaded
//! - **Metrics Collection**: Prometheus text export of every executed level
//! - **Reports**: console tables and JSON results
//!
//! ## Usage
//!
//! ```bash
//! # Sweep every endpoint in the default configuration
//! surge stress --target http://localhost:3000
//!
//! # Sweep two endpoints with a custom configuration
//! surge stress --config stress.toml --endpoint users --endpoint checkout
//!
//! # Show the concurrency ladder without sending traffic
//! surge plan --config stress.toml
//! ```

pub mod auth;
pub mod console;
pub mod engine;
pub mod metrics;
pub mod orchestrator;
pub mod report;
pub mod validate;

pub use console::ConsoleProgress;
pub use engine::HttpLoadEngine;
pub use metrics::PrometheusProgress;
pub use orchestrator::{run_http, StressSweep};
pub use report::{print_endpoint_summary, print_system_report, StressReport};
pub use validate::{AcceptAll, EndpointValidator, HttpProbe};
