//! Bearer token bootstrap, performed once before a sweep

use std::time::Duration;

use serde_json::json;
use surge_core::{join_url, AuthConfig, AuthContext, SurgeError};
use tracing::{info, warn};

/// Log in and extract the bearer token from the response
pub async fn bootstrap(
    client: &reqwest::Client,
    base_url: &str,
    config: &AuthConfig,
    timeout: Duration,
) -> Result<AuthContext, SurgeError> {
    let url = join_url(base_url, &config.login_path);
    info!(url = %url, username = %config.username, "Authenticating");

    let response = client
        .post(&url)
        .timeout(timeout)
        .json(&json!({
            "username": config.username,
            "password": config.password,
        }))
        .send()
        .await
        .map_err(|e| SurgeError::Auth(format!("login request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SurgeError::Auth(format!("login returned status {}", status)));
    }

    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| SurgeError::Auth(format!("login response is not JSON: {}", e)))?;

    token_from(&body, &config.token_field).map(AuthContext::new)
}

/// Like [`bootstrap`], but logs failures and continues unauthenticated
pub async fn bootstrap_or_continue(
    client: &reqwest::Client,
    base_url: &str,
    config: Option<&AuthConfig>,
    timeout: Duration,
) -> Option<AuthContext> {
    let config = config?;
    match bootstrap(client, base_url, config, timeout).await {
        Ok(auth) => {
            info!("Authentication successful");
            Some(auth)
        }
        Err(e) => {
            warn!("{}; authenticated endpoints will run without a token", e);
            None
        }
    }
}

fn token_from(body: &serde_json::Value, field: &str) -> Result<String, SurgeError> {
    match body.get(field) {
        Some(serde_json::Value::String(token)) if !token.is_empty() => Ok(token.clone()),
        Some(_) => Err(SurgeError::Auth(format!("field `{}` is not a token string", field))),
        None => Err(SurgeError::Auth(format!("login response has no `{}` field", field))),
    }
}
