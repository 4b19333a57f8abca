//! HTTP load engine
//!
//! Holds a fixed number of concurrent connections against a target for a
//! fixed duration. Every connection is a worker task that issues requests
//! back to back until the deadline, so the achieved request rate is whatever
//! the target can sustain at that concurrency.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use hdrhistogram::Histogram;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use surge_core::{HttpMethod, LoadEngine, LoadError, LoadOutcome, LoadTarget};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Pause after a connect failure before the worker retries
const CONNECT_BACKOFF: Duration = Duration::from_millis(10);

/// Highest latency the histogram tracks: 1µs to 5min
const MAX_TRACKED_LATENCY_US: u64 = 300_000_000;

// ============================================================================
// METRICS
// ============================================================================

/// Counters shared by the workers of one concurrency level
#[derive(Debug)]
pub struct LevelMetrics {
    /// Requests that received an HTTP response
    pub responses: AtomicU64,

    /// Requests that received no response
    pub errors: AtomicU64,

    /// Subset of errors caused by the request timeout
    pub timeouts: AtomicU64,

    /// Subset of errors caused by connection failures
    pub connect_errors: AtomicU64,

    /// Response latency histogram (microseconds)
    pub latency_histogram: RwLock<Histogram<u64>>,

    /// Responses by status code
    pub status_codes: RwLock<BTreeMap<u16, u64>>,

    /// Most recent transport error message
    pub last_error: RwLock<Option<String>>,
}

impl LevelMetrics {
    pub fn new() -> Result<Self, LoadError> {
        let histogram = Histogram::new_with_bounds(1, MAX_TRACKED_LATENCY_US, 3)
            .map_err(|e| LoadError::Client(format!("latency histogram: {}", e)))?;

        Ok(Self {
            responses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            connect_errors: AtomicU64::new(0),
            latency_histogram: RwLock::new(histogram),
            status_codes: RwLock::new(BTreeMap::new()),
            last_error: RwLock::new(None),
        })
    }

    /// Record a request that received a response
    pub fn record_response(&self, status: u16, latency_us: u64) {
        self.responses.fetch_add(1, Ordering::Relaxed);
        *self.status_codes.write().entry(status).or_insert(0) += 1;

        let latency_us = latency_us.clamp(1, MAX_TRACKED_LATENCY_US);
        if let Err(e) = self.latency_histogram.write().record(latency_us) {
            warn!("Failed to record latency: {}", e);
        }
    }

    /// Record a request that failed before a response arrived
    pub fn record_failure(&self, kind: FailureKind, message: String) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        match kind {
            FailureKind::Timeout => {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
            }
            FailureKind::Connect => {
                self.connect_errors.fetch_add(1, Ordering::Relaxed);
            }
            FailureKind::Other => {}
        }
        *self.last_error.write() = Some(message);
    }

    /// Fold the counters into an outcome.
    ///
    /// Fails with a transport error when nothing but connect failures happened.
    pub fn finish(&self, elapsed: Duration) -> Result<LoadOutcome, LoadError> {
        let responses = self.responses.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let connect_errors = self.connect_errors.load(Ordering::Relaxed);

        if responses == 0 && errors > 0 && connect_errors == errors {
            let cause = self
                .last_error
                .read()
                .clone()
                .unwrap_or_else(|| "connection failed".to_string());
            return Err(LoadError::Transport(format!(
                "all {} requests failed to connect: {}",
                errors, cause
            )));
        }

        let hist = self.latency_histogram.read();
        let (latency_avg_ms, latency_p95_ms) = if hist.is_empty() {
            (0.0, 0.0)
        } else {
            (hist.mean() / 1000.0, hist.value_at_quantile(0.95) as f64 / 1000.0)
        };

        let secs = elapsed.as_secs_f64();
        let throughput_avg = if secs > 0.0 {
            responses as f64 / secs
        } else {
            0.0
        };

        Ok(LoadOutcome {
            requests_total: responses + errors,
            throughput_avg,
            latency_avg_ms,
            latency_p95_ms,
            errors,
            timeouts: self.timeouts.load(Ordering::Relaxed),
            status_code_counts: self.status_codes.read().clone(),
        })
    }
}

/// Classification of a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Connect,
    Other,
}

impl FailureKind {
    fn of(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Connect
        } else {
            Self::Other
        }
    }
}

// ============================================================================
// REQUEST
// ============================================================================

/// A target resolved into reqwest types once per level
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    method: reqwest::Method,
    url: reqwest::Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl PreparedRequest {
    pub fn from_target(target: &LoadTarget) -> Result<Self, LoadError> {
        let url = reqwest::Url::parse(&target.url)
            .map_err(|e| LoadError::InvalidTarget(format!("{}: {}", target.url, e)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &target.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| LoadError::InvalidTarget(format!("header `{}`: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| LoadError::InvalidTarget(format!("header `{}`: {}", name, e)))?;
            headers.insert(name, value);
        }

        let body = target
            .body
            .as_ref()
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| LoadError::InvalidTarget(format!("body: {}", e)))?;

        Ok(Self {
            method: method(target.method),
            url,
            headers,
            body,
        })
    }

    pub fn build(&self, client: &reqwest::Client, timeout: Duration) -> reqwest::RequestBuilder {
        let builder = client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone())
            .timeout(timeout);

        match &self.body {
            Some(body) => builder.body(body.clone()),
            None => builder,
        }
    }
}

/// Map a core method onto reqwest's
pub fn method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// [`LoadEngine`] that issues real HTTP requests with reqwest
#[derive(Debug, Clone)]
pub struct HttpLoadEngine {
    client: reqwest::Client,
}

impl HttpLoadEngine {
    /// Create an engine with its own connection pool
    pub fn new() -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("surge/", env!("CARGO_PKG_VERSION")))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LoadError::Client(e.to_string()))?;
        Ok(Self::with_client(client))
    }

    /// Create an engine sharing an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl LoadEngine for HttpLoadEngine {
    async fn run_load(
        &self,
        target: &LoadTarget,
        connections: u32,
        duration: Duration,
        timeout: Duration,
    ) -> Result<LoadOutcome, LoadError> {
        let request = Arc::new(PreparedRequest::from_target(target)?);
        let metrics = Arc::new(LevelMetrics::new()?);

        debug!(
            url = %target.url,
            method = %target.method,
            connections,
            duration_secs = duration.as_secs_f64(),
            "Starting load burst"
        );

        let start = Instant::now();
        let deadline = start + duration;

        let mut workers = FuturesUnordered::new();
        for _ in 0..connections {
            workers.push(tokio::spawn(run_worker(
                self.client.clone(),
                request.clone(),
                metrics.clone(),
                deadline,
                timeout,
            )));
        }

        while let Some(joined) = workers.next().await {
            if let Err(e) = joined {
                warn!("Load worker ended abnormally: {}", e);
            }
        }

        let elapsed = start.elapsed();
        let outcome = metrics.finish(elapsed)?;

        debug!(
            connections,
            requests = outcome.requests_total,
            errors = outcome.errors,
            throughput = outcome.throughput_avg,
            "Load burst complete"
        );

        Ok(outcome)
    }
}

/// One connection: requests back to back until the deadline
async fn run_worker(
    client: reqwest::Client,
    request: Arc<PreparedRequest>,
    metrics: Arc<LevelMetrics>,
    deadline: Instant,
    timeout: Duration,
) {
    while Instant::now() < deadline {
        let start = Instant::now();

        // a response counts only once its body has been read in full
        let result = match request.build(&client, timeout).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                response.bytes().await.map(|_| status)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(status) => {
                metrics.record_response(status, start.elapsed().as_micros() as u64);
            }
            Err(e) => {
                let kind = FailureKind::of(&e);
                metrics.record_failure(kind, e.to_string());
                if kind == FailureKind::Connect {
                    sleep(CONNECT_BACKOFF).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_from_metrics() {
        let metrics = LevelMetrics::new().unwrap();
        for latency_us in [1_000, 2_000, 3_000, 4_000] {
            metrics.record_response(200, latency_us);
        }
        metrics.record_response(503, 10_000);
        metrics.record_failure(FailureKind::Timeout, "operation timed out".to_string());

        let outcome = metrics.finish(Duration::from_secs(2)).unwrap();
        assert_eq!(outcome.requests_total, 6);
        assert_eq!(outcome.errors, 1);
        assert_eq!(outcome.timeouts, 1);
        assert!((outcome.throughput_avg - 2.5).abs() < 1e-9);
        assert!((outcome.latency_avg_ms - 4.0).abs() < 0.05);
        assert_eq!(outcome.status_code_counts.get(&200), Some(&4));
        assert_eq!(outcome.status_code_counts.get(&503), Some(&1));
    }

    #[test]
    fn test_connect_failures_only_is_transport_error() {
        let metrics = LevelMetrics::new().unwrap();
        metrics.record_failure(FailureKind::Connect, "connection refused".to_string());
        metrics.record_failure(FailureKind::Connect, "connection refused".to_string());

        let err = metrics.finish(Duration::from_secs(1)).unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_mixed_failures_are_not_transport_error() {
        let metrics = LevelMetrics::new().unwrap();
        metrics.record_failure(FailureKind::Connect, "connection refused".to_string());
        metrics.record_failure(FailureKind::Timeout, "timed out".to_string());

        let outcome = metrics.finish(Duration::from_secs(1)).unwrap();
        assert_eq!(outcome.errors, 2);
        assert_eq!(outcome.requests_total, 2);
        assert_eq!(outcome.throughput_avg, 0.0);
    }

    #[test]
    fn test_empty_level() {
        let metrics = LevelMetrics::new().unwrap();
        let outcome = metrics.finish(Duration::ZERO).unwrap();
        assert_eq!(outcome, LoadOutcome::default());
    }

    #[test]
    fn test_prepared_request() {
        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), "Bearer abc".to_string());
        let target = LoadTarget {
            url: "http://localhost:3000/api/checkout".to_string(),
            method: HttpMethod::Post,
            headers,
            body: Some(json!({"items": [1]})),
        };

        let prepared = PreparedRequest::from_target(&target).unwrap();
        assert_eq!(prepared.method, reqwest::Method::POST);
        assert_eq!(prepared.url.path(), "/api/checkout");
        assert_eq!(prepared.headers.get("authorization").unwrap(), "Bearer abc");
        assert_eq!(prepared.body.as_deref(), Some(br#"{"items":[1]}"#.as_slice()));
    }

    #[test]
    fn test_invalid_target() {
        let target = LoadTarget {
            url: "not a url".to_string(),
            method: HttpMethod::Get,
            headers: BTreeMap::new(),
            body: None,
        };
        assert!(matches!(
            PreparedRequest::from_target(&target),
            Err(LoadError::InvalidTarget(_))
        ));
    }
}
