//! Explicit configuration for the external usuarios API and the session cookie.
//! Values are constructed once at startup and passed into the components that
//! need them; nothing in this crate reads the environment after boot.

use std::time::Duration;

/// Connection settings for the external usuarios API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the API, e.g. "http://localhost:3000/api". No trailing slash.
    pub base_url: String,
    /// Per-request timeout for login and profile calls.
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base = base_url.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self { base_url: base, timeout: Duration::from_secs(5) }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Secret used to key the session cookie MAC. Sessions signed with a different
/// secret fail verification and materialize as anonymous.
#[derive(Clone)]
pub struct SessionSecret(pub String);

impl std::fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionSecret(..)")
    }
}

/// Full gateway configuration as read by main.rs. Library consumers build
/// `ApiConfig`/`SessionSecret` directly instead.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api: ApiConfig,
    pub secret: SessionSecret,
    pub http_port: u16,
}

impl GatewayConfig {
    /// Read configuration from the environment with the same defaults the
    /// original deployment used. Intended for main.rs only.
    pub fn from_env() -> Self {
        let base_url = std::env::var("HEALTHTRACK_API_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000/api".to_string());
        let secret = std::env::var("HEALTHTRACK_SECRET_KEY")
            .unwrap_or_else(|_| "healthtrack-insecure-dev-secret".to_string());
        let http_port = std::env::var("HEALTHTRACK_HTTP_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8000);
        Self {
            api: ApiConfig::new(base_url),
            secret: SessionSecret(secret),
            http_port,
        }
    }
}
