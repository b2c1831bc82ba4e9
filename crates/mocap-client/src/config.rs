//! Client configuration.

use std::time::Duration;

use mocap_models::ArtifactNaming;

/// Configuration for [`crate::RenderClient`].
///
/// Built once at startup and passed by value into the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the render server
    pub base_url: String,
    /// Static bearer token sent with every request
    pub token: String,
    /// Wait between two status requests
    pub poll_interval: Duration,
    /// Give up polling once this much time has passed (unbounded when `None`)
    pub deadline: Option<Duration>,
    /// Per-request timeout (transport default when `None`)
    pub request_timeout: Option<Duration>,
    /// Retries for transport failures (connect/timeout), 0 disables retrying
    pub max_retries: u32,
    /// How downloaded artifacts are named
    pub naming: ArtifactNaming,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5001".to_string(),
            token: String::new(),
            poll_interval: Duration::from_secs(5),
            deadline: None,
            request_timeout: None,
            max_retries: 0,
            naming: ArtifactNaming::default(),
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("RENDER_SERVER_URL")
                .unwrap_or_else(|_| "http://localhost:5001".to_string()),
            token: std::env::var("RENDER_API_TOKEN").unwrap_or_default(),
            poll_interval: Duration::from_secs(
                std::env::var("RENDER_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            deadline: std::env::var("RENDER_DEADLINE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
            request_timeout: std::env::var("RENDER_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
            max_retries: std::env::var("RENDER_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            naming: ArtifactNaming::default(),
        }
    }

    /// Absolute URL for a server-relative locator.
    pub fn url(&self, locator: &str) -> String {
        if locator.starts_with('/') {
            format!("{}{}", self.base_url.trim_end_matches('/'), locator)
        } else {
            format!("{}{}", self.base_url, locator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:5001");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(config.deadline.is_none());
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_url_joins_locator() {
        let config = ClientConfig {
            base_url: "http://render.local:5001/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.url("/status/42"), "http://render.local:5001/status/42");
    }
}
