//! Stress test configuration types

use crate::error::ConfigError;
use crate::types::{EndpointSpec, HttpMethod, ResponseExpectation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Complete stress test configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StressConfig {
    /// Target server settings
    #[serde(default)]
    pub target: TargetConfig,

    /// Escalation and detection parameters
    #[serde(default)]
    pub escalation: EscalationConfig,

    /// System-wide analysis parameters
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Optional login performed once before the sweep
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Endpoints to escalate, in sweep order
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<EndpointSpec>,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            escalation: EscalationConfig::default(),
            aggregation: AggregationConfig::default(),
            auth: Some(AuthConfig::default()),
            logging: LoggingConfig::default(),
            endpoints: default_endpoints(),
        }
    }
}

impl StressConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Reject configurations the sweep cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("target.base_url is empty".to_string()));
        }
        if self.escalation.duration_secs == 0 {
            return Err(ConfigError::Invalid(
                "escalation.duration_secs must be positive".to_string(),
            ));
        }
        if self.escalation.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "escalation.timeout_secs must be positive".to_string(),
            ));
        }

        let thresholds = &self.escalation.thresholds;
        if !is_positive(thresholds.skip_ahead_multiplier) {
            return Err(ConfigError::Invalid(
                "escalation.thresholds.skip_ahead_multiplier must be positive".to_string(),
            ));
        }
        if !is_positive(thresholds.throughput_drop_ratio) {
            return Err(ConfigError::Invalid(
                "escalation.thresholds.throughput_drop_ratio must be positive".to_string(),
            ));
        }
        if !is_positive(self.aggregation.safe_margin) {
            return Err(ConfigError::Invalid(
                "aggregation.safe_margin must be positive".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            if !seen.insert(endpoint.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate endpoint name `{}`",
                    endpoint.name
                )));
            }
        }

        Ok(())
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Target server settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Base URL endpoint paths are joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Escalation walk parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Load duration per concurrency level in seconds
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Degradation and stopping thresholds
    #[serde(default)]
    pub thresholds: DetectorThresholds,
}

fn default_duration_secs() -> u64 {
    10
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
            timeout_secs: default_timeout_secs(),
            thresholds: DetectorThresholds::default(),
        }
    }
}

impl EscalationConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Thresholds used by the degradation detector
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectorThresholds {
    /// Throughput below `previous * ratio` counts as degradation
    #[serde(default = "default_throughput_drop_ratio")]
    pub throughput_drop_ratio: f64,

    /// Error rate above this counts as degradation
    #[serde(default = "default_degraded_error_rate")]
    pub degraded_error_rate: f64,

    /// Average latency (ms) above this counts as degradation
    #[serde(default = "default_degraded_latency_ms")]
    pub degraded_latency_ms: f64,

    /// Error rate above this stops the endpoint
    #[serde(default = "default_hard_stop_error_rate")]
    pub hard_stop_error_rate: f64,

    /// Average latency (ms) above this stops the endpoint
    #[serde(default = "default_hard_stop_latency_ms")]
    pub hard_stop_latency_ms: f64,

    /// Levels above `degradation_point * multiplier` are skipped
    #[serde(default = "default_skip_ahead_multiplier")]
    pub skip_ahead_multiplier: f64,
}

fn default_throughput_drop_ratio() -> f64 {
    0.8
}

fn default_degraded_error_rate() -> f64 {
    0.05
}

fn default_degraded_latency_ms() -> f64 {
    1000.0
}

fn default_hard_stop_error_rate() -> f64 {
    0.10
}

fn default_hard_stop_latency_ms() -> f64 {
    3000.0
}

fn default_skip_ahead_multiplier() -> f64 {
    2.0
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            throughput_drop_ratio: default_throughput_drop_ratio(),
            degraded_error_rate: default_degraded_error_rate(),
            degraded_latency_ms: default_degraded_latency_ms(),
            hard_stop_error_rate: default_hard_stop_error_rate(),
            hard_stop_latency_ms: default_hard_stop_latency_ms(),
            skip_ahead_multiplier: default_skip_ahead_multiplier(),
        }
    }
}

/// System-wide analysis parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Recommended ceiling = floor(bottleneck * safe_margin)
    #[serde(default = "default_safe_margin")]
    pub safe_margin: f64,

    /// Number of top performers reported
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Path markers mapped to scaling advice
    #[serde(default = "default_markers")]
    pub markers: Vec<WorkloadMarker>,

    /// Advice appended whenever any endpoint degraded
    #[serde(default = "default_general_advice")]
    pub general_advice: String,
}

fn default_safe_margin() -> f64 {
    0.7
}

fn default_top_n() -> usize {
    3
}

fn default_general_advice() -> String {
    "Consider horizontal scaling (load balancer + multiple instances) for overall capacity"
        .to_string()
}

fn default_markers() -> Vec<WorkloadMarker> {
    vec![
        WorkloadMarker::new(
            "cpu-intensive",
            "Consider vertical scaling (more CPU cores) for CPU-intensive endpoints",
        ),
        WorkloadMarker::new(
            "memory-intensive",
            "Increase available memory or optimize memory usage for memory-intensive endpoints",
        ),
        WorkloadMarker::new(
            "db-intensive",
            "Optimize database queries, add indexes, or enlarge the connection pool \
             for DB-intensive endpoints",
        ),
        WorkloadMarker::new(
            "weather",
            "Implement caching for external API calls to reduce upstream latency",
        ),
    ]
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            safe_margin: default_safe_margin(),
            top_n: default_top_n(),
            markers: default_markers(),
            general_advice: default_general_advice(),
        }
    }
}

/// Path substring identifying a workload category
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadMarker {
    pub marker: String,
    pub advice: String,
}

impl WorkloadMarker {
    pub fn new(marker: impl Into<String>, advice: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            advice: advice.into(),
        }
    }
}

/// Login request used to obtain a bearer token
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Login path joined onto the base URL
    #[serde(default = "default_login_path")]
    pub login_path: String,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_password")]
    pub password: String,

    /// JSON field holding the token in the login response
    #[serde(default = "default_token_field")]
    pub token_field: String,
}

fn default_login_path() -> String {
    "/api/auth/login".to_string()
}

fn default_username() -> String {
    "testuser".to_string()
}

fn default_password() -> String {
    "password123".to_string()
}

fn default_token_field() -> String {
    "token".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            username: default_username(),
            password: default_password(),
            token_field: default_token_field(),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: `text` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn status_fields(fields: &[&str]) -> ResponseExpectation {
    ResponseExpectation {
        status: None,
        json_fields: fields.iter().map(|f| f.to_string()).collect(),
    }
}

/// Demo server endpoints swept when no config file is given
fn default_endpoints() -> Vec<EndpointSpec> {
    vec![
        EndpointSpec::new("health", "/api/health")
            .with_description("Health check")
            .with_max_connections(20000)
            .with_expectation(status_fields(&["status"])),
        EndpointSpec::new("users", "/api/users")
            .with_description("User listing")
            .with_max_connections(5000)
            .with_expectation(status_fields(&["users"])),
        EndpointSpec::new("products", "/api/products")
            .with_description("Product catalog")
            .with_max_connections(5000)
            .with_expectation(status_fields(&["products"])),
        EndpointSpec::new("checkout", "/api/checkout")
            .with_method(HttpMethod::Post)
            .with_description("Authenticated checkout")
            .with_body(json!({"items": [{"productId": 1, "quantity": 2}]}))
            .with_auth()
            .with_max_connections(2000),
        EndpointSpec::new("cpu-intensive", "/api/cpu-intensive")
            .with_description("Simulated CPU-bound work")
            .with_max_connections(1000),
        EndpointSpec::new("memory-intensive", "/api/memory-intensive")
            .with_description("Simulated memory pressure")
            .with_max_connections(1000),
        EndpointSpec::new("db-intensive", "/api/db-intensive")
            .with_description("Simulated database load")
            .with_max_connections(1000),
        EndpointSpec::new("weather", "/api/weather/london")
            .with_description("External API call")
            .with_max_connections(2000),
    ]
}
