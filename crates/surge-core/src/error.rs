//! Error types for Surge stress testing

use thiserror::Error;

/// Result type alias for Surge operations
pub type Result<T> = std::result::Result<T, SurgeError>;

/// Top-level error for Surge operations
#[derive(Error, Debug)]
pub enum SurgeError {
    /// Load engine failure
    #[error("Load engine error: {0}")]
    Load(#[from] LoadError),

    /// Endpoint response did not match its expectation
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Authentication bootstrap failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by a load engine while running one concurrency level
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    /// Every connection attempt failed; no response was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// The engine could not be set up (client construction, runtime)
    #[error("Client error: {0}")]
    Client(String),

    /// The target could not be turned into a request
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
}

impl LoadError {
    /// Whether the failure came from the network rather than local setup
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// An endpoint's response shape was not what its validator expected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Validation failed for {endpoint}: {reason}")]
pub struct ValidationFailure {
    pub endpoint: String,
    pub reason: String,
}

impl ValidationFailure {
    pub fn new(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SurgeError::from(LoadError::Transport("connection refused".to_string()));
        let msg = format!("{}", err);
        assert!(msg.contains("Transport error"));
        assert!(msg.contains("connection refused"));

        let err = SurgeError::from(ValidationFailure::new("health", "missing field `status`"));
        assert_eq!(
            err.to_string(),
            "Validation failed for health: missing field `status`"
        );
    }

    #[test]
    fn test_transport_classification() {
        assert!(LoadError::Transport("refused".into()).is_transport());
        assert!(!LoadError::Client("tls backend".into()).is_transport());
        assert!(!LoadError::InvalidTarget("bad url".into()).is_transport());
    }
}
