//! Client configuration.
//!
//! Base URLs and credentials are process-wide and fixed at startup. Values are
//! used as loaded: an empty base URL or key is not rejected here.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Deserializer};
use std::fmt;
use zeroize::Zeroizing;

/// Environment variable overriding the API base URL.
pub const ENV_API_BASE_URL: &str = "STORELINK_API_BASE_URL";
/// Environment variable overriding the WebSocket base URL.
pub const ENV_WS_BASE_URL: &str = "STORELINK_WS_BASE_URL";
/// Environment variable overriding the access identifier.
pub const ENV_ACCESS_KEY: &str = "STORELINK_ACCESS_KEY";
/// Environment variable overriding the secret key.
pub const ENV_SECRET_KEY: &str = "STORELINK_SECRET_KEY";

/// Access identifier and secret key pair.
///
/// Only the access identifier is ever transmitted. The secret is zeroed on
/// drop and never printed.
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    /// Access identifier sent in `X-DATASTORE-ACCESS`.
    #[serde(default)]
    pub access_key: String,
    /// HMAC key for request signatures.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub secret_key: Zeroizing<String>,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: Zeroizing::new(secret_key.into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Zeroizing<String>, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(Zeroizing::new)
}

/// Network layer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL for HTTP requests (e.g., "https://api.example.com").
    #[serde(default)]
    pub api_base_url: String,
    /// Base URL for WebSocket channels (e.g., "wss://ws.example.com").
    #[serde(default)]
    pub ws_base_url: String,
    /// Signing credentials.
    #[serde(default)]
    pub credentials: Credentials,
    /// Per-request timeout. `None` waits indefinitely.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// Outbound queue capacity per WebSocket connection.
    #[serde(default = "default_ws_outbound_buffer")]
    pub ws_outbound_buffer: usize,
}

fn default_ws_outbound_buffer() -> usize {
    100
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            ws_base_url: String::new(),
            credentials: Credentials::default(),
            request_timeout_ms: None,
            ws_outbound_buffer: default_ws_outbound_buffer(),
        }
    }
}

impl ClientConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        toml::from_str(content).map_err(|e| CoreError::Config(format!("Failed to parse config: {e}")))
    }

    /// Override fields from `STORELINK_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override fields from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_API_BASE_URL) {
            self.api_base_url = v;
        }
        if let Some(v) = lookup(ENV_WS_BASE_URL) {
            self.ws_base_url = v;
        }
        if let Some(v) = lookup(ENV_ACCESS_KEY) {
            self.credentials.access_key = v;
        }
        if let Some(v) = lookup(ENV_SECRET_KEY) {
            tracing::debug!("Secret key overridden from environment");
            self.credentials.secret_key = Zeroizing::new(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.api_base_url.is_empty());
        assert_eq!(config.request_timeout_ms, None);
        assert_eq!(config.ws_outbound_buffer, 100);
    }

    #[test]
    fn test_from_toml() {
        let config = ClientConfig::from_toml_str(
            r#"
            api_base_url = "https://api.example.com"
            ws_base_url = "wss://ws.example.com"
            request_timeout_ms = 5000

            [credentials]
            access_key = "shop-frontend"
            secret_key = "s3cr3t"
            "#,
        )
        .unwrap();

        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.ws_base_url, "wss://ws.example.com");
        assert_eq!(config.credentials.access_key, "shop-frontend");
        assert_eq!(config.credentials.secret_key.as_str(), "s3cr3t");
        assert_eq!(config.request_timeout_ms, Some(5000));
        assert_eq!(config.ws_outbound_buffer, 100);
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        let err = ClientConfig::from_toml_str("api_base_url = [").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_BASE_URL, "https://override.example.com"),
            (ENV_SECRET_KEY, "from-env"),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::default();
        config.credentials.access_key = "kept".to_string();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_base_url, "https://override.example.com");
        assert!(config.ws_base_url.is_empty());
        assert_eq!(config.credentials.access_key, "kept");
        assert_eq!(config.credentials.secret_key.as_str(), "from-env");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("id", "topsecret");
        let printed = format!("{creds:?}");
        assert!(printed.contains("id"));
        assert!(!printed.contains("topsecret"));
    }
}
