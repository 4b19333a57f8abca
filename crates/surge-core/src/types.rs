//! Core data model: endpoints, load targets, engine outcomes and metrics samples

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default concurrency ladder walked for every endpoint
pub const DEFAULT_LADDER: [u32; 11] = [10, 25, 50, 100, 250, 500, 1000, 2000, 5000, 10000, 20000];

/// HTTP method of an endpoint under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected response shape, checked once before an endpoint is escalated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseExpectation {
    /// Exact status code; any 2xx when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Top-level JSON fields that must be present in the body
    #[serde(default)]
    pub json_fields: Vec<String>,
}

impl ResponseExpectation {
    /// Check a probe response against this expectation
    pub fn check(&self, status: u16, body: Option<&serde_json::Value>) -> Result<(), String> {
        match self.status {
            Some(expected) if expected != status => {
                return Err(format!("expected status {}, got {}", expected, status));
            }
            None if !(200..300).contains(&status) => {
                return Err(format!("expected a 2xx status, got {}", status));
            }
            _ => {}
        }

        if self.json_fields.is_empty() {
            return Ok(());
        }

        let object = body
            .and_then(|b| b.as_object())
            .ok_or_else(|| "expected a JSON object body".to_string())?;

        match self.json_fields.iter().find(|f| !object.contains_key(f.as_str())) {
            Some(missing) => Err(format!("missing field `{}`", missing)),
            None => Ok(()),
        }
    }
}

/// An endpoint to be stress tested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSpec {
    /// Display name, unique within a sweep
    pub name: String,

    /// Path appended to the target base URL
    pub path: String,

    #[serde(default)]
    pub method: HttpMethod,

    #[serde(default)]
    pub description: String,

    /// JSON request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,

    /// Extra request headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Attach the sweep's bearer token
    #[serde(default)]
    pub requires_auth: bool,

    /// Response shape checked before escalation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<ResponseExpectation>,

    /// Concurrency ceiling for this endpoint
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Concurrency levels to walk
    #[serde(default = "default_ladder")]
    pub ladder: Vec<u32>,
}

fn default_max_connections() -> u32 {
    1000
}

fn default_ladder() -> Vec<u32> {
    DEFAULT_LADDER.to_vec()
}

impl EndpointSpec {
    /// Create a GET endpoint with the default ladder
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            method: HttpMethod::Get,
            description: String::new(),
            body: None,
            headers: BTreeMap::new(),
            requires_auth: false,
            expect: None,
            max_connections: default_max_connections(),
            ladder: default_ladder(),
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_ladder(mut self, ladder: impl Into<Vec<u32>>) -> Self {
        self.ladder = ladder.into();
        self
    }

    pub fn with_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn with_expectation(mut self, expect: ResponseExpectation) -> Self {
        self.expect = Some(expect);
        self
    }

    /// Levels actually walked: non-zero, within `max_connections`, ascending, unique
    pub fn effective_ladder(&self) -> Vec<u32> {
        let mut levels: Vec<u32> = self
            .ladder
            .iter()
            .copied()
            .filter(|&c| c > 0 && c <= self.max_connections)
            .collect();
        levels.sort_unstable();
        levels.dedup();
        levels
    }

    /// Build the request target against a base URL
    pub fn target(&self, base_url: &str, auth: Option<&AuthContext>) -> LoadTarget {
        let mut headers = self.headers.clone();
        if self.requires_auth {
            if let Some(auth) = auth {
                // the session token replaces any configured authorization header
                headers.retain(|name, _| !name.eq_ignore_ascii_case("authorization"));
                headers.insert("Authorization".to_string(), auth.bearer());
            }
        }
        let has_content_type = headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case("content-type"));
        if self.body.is_some() && !has_content_type {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }

        LoadTarget {
            url: join_url(base_url, &self.path),
            method: self.method,
            headers,
            body: self.body.clone(),
        }
    }
}

/// Join a base URL and a path with exactly one slash between them
pub fn join_url(base_url: &str, path: &str) -> String {
    match (base_url.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base_url, &path[1..]),
        (false, false) if !path.is_empty() => format!("{}/{}", base_url, path),
        _ => format!("{}{}", base_url, path),
    }
}

/// Read-only credentials obtained once before a sweep
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    token: String,
}

impl AuthContext {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// `Authorization` header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// A fully resolved request handed to a load engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadTarget {
    pub url: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

/// Aggregate result of one load burst, as reported by the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadOutcome {
    /// Requests attempted (responses plus errors)
    pub requests_total: u64,

    /// Average completed requests per second
    pub throughput_avg: f64,

    /// Mean latency in milliseconds
    pub latency_avg_ms: f64,

    /// 95th percentile latency in milliseconds
    pub latency_p95_ms: f64,

    /// Requests that received no response (includes timeouts)
    pub errors: u64,

    /// Requests that hit the per-request timeout
    pub timeouts: u64,

    /// Responses by HTTP status code
    pub status_code_counts: BTreeMap<u16, u64>,
}

/// Result of one load run at a fixed concurrency level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub connections: u32,
    pub throughput: f64,
    pub latency_avg_ms: f64,
    pub latency_p95_ms: f64,
    /// errors / max(requests_total, 1)
    pub error_rate: f64,
    pub status_code_counts: BTreeMap<u16, u64>,
    pub requests_total: u64,
    pub errors: u64,
    pub timeouts: u64,
}

impl MetricsSample {
    /// Build a sample from an engine outcome; non-finite values become zero
    pub fn from_outcome(connections: u32, outcome: LoadOutcome) -> Self {
        let error_rate = outcome.errors as f64 / outcome.requests_total.max(1) as f64;

        Self {
            connections,
            throughput: finite_or_zero(outcome.throughput_avg),
            latency_avg_ms: finite_or_zero(outcome.latency_avg_ms),
            latency_p95_ms: finite_or_zero(outcome.latency_p95_ms),
            error_rate: finite_or_zero(error_rate).clamp(0.0, 1.0),
            status_code_counts: outcome.status_code_counts,
            requests_total: outcome.requests_total,
            errors: outcome.errors,
            timeouts: outcome.timeouts,
        }
    }

    /// Count of responses outside the 2xx range
    pub fn non_2xx(&self) -> u64 {
        self.status_code_counts
            .iter()
            .filter(|(code, _)| !(200..300).contains(*code))
            .map(|(_, count)| count)
            .sum()
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
