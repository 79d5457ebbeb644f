use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the HTTP authentication call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpAuthConfig {
    /// Full URL of the auth endpoint
    #[serde(default)]
    pub auth_url: String,
    /// SDK key, sent as a bearer token
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_sdk_version")]
    pub sdk_version: String,
    /// Sent only when known
    #[serde(default)]
    pub machine_name: Option<String>,
    /// Sent only when known
    #[serde(default)]
    pub machine_ip: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Refresh this long before the token actually expires
    #[serde(default = "default_token_refresh_margin_secs")]
    pub token_refresh_margin_secs: u64,
}

fn default_sdk_version() -> String {
    format!("rust-{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_token_refresh_margin_secs() -> u64 {
    600
}

impl HttpAuthConfig {
    pub fn new(auth_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            auth_url: auth_url.into(),
            api_key: api_key.into(),
            sdk_version: default_sdk_version(),
            machine_name: None,
            machine_ip: None,
            timeout_ms: default_timeout_ms(),
            token_refresh_margin_secs: default_token_refresh_margin_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn token_refresh_margin(&self) -> Duration {
        Duration::from_secs(self.token_refresh_margin_secs)
    }
}
