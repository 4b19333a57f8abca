//! Response-shape validation before an endpoint is escalated

use std::time::Duration;

use async_trait::async_trait;
use surge_core::{EndpointSpec, LoadTarget, ValidationFailure};
use tracing::debug;

use crate::engine::PreparedRequest;

/// Checks that an endpoint answers as expected before it is put under load
#[async_trait]
pub trait EndpointValidator: Send + Sync {
    async fn validate(
        &self,
        spec: &EndpointSpec,
        target: &LoadTarget,
    ) -> Result<(), ValidationFailure>;
}

/// Accepts every endpoint without probing it
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

#[async_trait]
impl EndpointValidator for AcceptAll {
    async fn validate(
        &self,
        _spec: &EndpointSpec,
        _target: &LoadTarget,
    ) -> Result<(), ValidationFailure> {
        Ok(())
    }
}

/// Sends one request and checks it against the endpoint's expectation
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl EndpointValidator for HttpProbe {
    async fn validate(
        &self,
        spec: &EndpointSpec,
        target: &LoadTarget,
    ) -> Result<(), ValidationFailure> {
        let request = PreparedRequest::from_target(target)
            .map_err(|e| ValidationFailure::new(&spec.name, e.to_string()))?;

        let response = request
            .build(&self.client, self.timeout)
            .send()
            .await
            .map_err(|e| {
                ValidationFailure::new(&spec.name, format!("probe request failed: {}", e))
            })?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| {
                ValidationFailure::new(&spec.name, format!("probe body unreadable: {}", e))
            })?;
        let body = serde_json::from_slice::<serde_json::Value>(&bytes).ok();

        debug!(endpoint = %spec.name, status, json = body.is_some(), "Probe response");

        spec.expect
            .clone()
            .unwrap_or_default()
            .check(status, body.as_ref())
            .map_err(|reason| ValidationFailure::new(&spec.name, reason))
    }
}
