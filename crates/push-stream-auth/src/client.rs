//! HTTP authentication client

use std::time::Duration;

use async_trait::async_trait;
use push_stream::{AuthClient, AuthResult, Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::HttpAuthConfig;
use crate::token::decode_token;

const UNKNOWN: &str = "unknown";
const MIN_REFRESH: Duration = Duration::from_secs(1);

static SDK_VERSION_HEADER: HeaderName = HeaderName::from_static("splitsdkversion");
static MACHINE_NAME_HEADER: HeaderName = HeaderName::from_static("splitsdkmachinename");
static MACHINE_IP_HEADER: HeaderName = HeaderName::from_static("splitsdkmachineip");

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    push_enabled: bool,
    #[serde(default)]
    token: Option<String>,
}

/// Authenticates against the push authentication endpoint.
///
/// Server errors and transport failures produce `retry = true` so the
/// caller tries again later; other client errors disable push for good.
pub struct HttpAuthClient {
    http: reqwest::Client,
    config: HttpAuthConfig,
}

impl HttpAuthClient {
    pub fn new(config: HttpAuthConfig) -> Result<Self> {
        if config.auth_url.is_empty() {
            return Err(Error::Config("auth_url is required".to_string()));
        }
        if config.api_key.is_empty() {
            return Err(Error::Config("api_key is required".to_string()));
        }

        let http = reqwest::Client::builder()
            .default_headers(default_headers(&config)?)
            .timeout(config.timeout())
            .build()?;

        Ok(Self { http, config })
    }

    fn expiration(&self, lifetime: Duration) -> Duration {
        let margin = self.config.token_refresh_margin();
        let refresh_in = if lifetime > margin {
            lifetime - margin
        } else {
            lifetime
        };
        refresh_in.max(MIN_REFRESH)
    }
}

fn default_headers(config: &HttpAuthConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", config.api_key))?);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(SDK_VERSION_HEADER.clone(), header_value(&config.sdk_version)?);

    if let Some(name) = known(config.machine_name.as_deref()) {
        headers.insert(MACHINE_NAME_HEADER.clone(), header_value(name)?);
    }
    if let Some(ip) = known(config.machine_ip.as_deref()) {
        headers.insert(MACHINE_IP_HEADER.clone(), header_value(ip)?);
    }
    Ok(headers)
}

fn known(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty() && *v != UNKNOWN)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader(e.to_string()))
}

#[async_trait]
impl AuthClient for HttpAuthClient {
    async fn authenticate(&self) -> Result<AuthResult> {
        let response = match self.http.get(&self.config.auth_url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %self.config.auth_url, error = %e, "Authentication request failed");
                return Ok(AuthResult::disabled(true));
            }
        };

        let status = response.status();
        if status.is_server_error() {
            warn!(%status, "Authentication service unavailable");
            return Ok(AuthResult::disabled(true));
        }
        if !status.is_success() {
            warn!(%status, "Authentication rejected");
            return Ok(AuthResult::disabled(false));
        }

        let body: AuthResponse = response.json().await?;
        if !body.push_enabled {
            info!("Push not enabled for this SDK key");
            return Ok(AuthResult::disabled(false));
        }

        let token = body
            .token
            .ok_or_else(|| Error::Auth("push enabled without a token".to_string()))?;
        let claims = decode_token(&token)?;
        let expiration = self.expiration(claims.lifetime());

        debug!(
            channels = ?claims.channels,
            refresh_in_secs = expiration.as_secs(),
            "Authentication succeeded"
        );

        Ok(AuthResult::enabled(token, claims.channels, expiration))
    }
}

impl std::fmt::Debug for HttpAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAuthClient")
            .field("auth_url", &self.config.auth_url)
            .finish_non_exhaustive()
    }
}
