//! Claims carried by the streaming token

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use push_stream::notification::OCCUPANCY_PREFIX;
use push_stream::{Error, Result};
use serde::Deserialize;

/// The parts of the token the streaming core needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// Channels to subscribe to; control channels carry the occupancy prefix
    pub channels: Vec<String>,
    /// Issued-at, seconds since the epoch
    pub issued_at: u64,
    /// Expiry, seconds since the epoch
    pub expires_at: u64,
}

impl TokenClaims {
    /// Token validity as granted by the server
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.expires_at.saturating_sub(self.issued_at))
    }
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(rename = "x-ably-capability")]
    capability: String,
    exp: u64,
    iat: u64,
}

/// Read the (unverified) JWT payload of a streaming token
pub fn decode_token(token: &str) -> Result<TokenClaims> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| Error::Auth("token is not a JWT".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::Auth(format!("token payload is not base64url: {e}")))?;

    let raw: RawClaims = serde_json::from_slice(&bytes)?;
    let capability: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&raw.capability)?;

    let channels = capability
        .keys()
        .map(|channel| {
            if channel.contains("control") {
                format!("{OCCUPANCY_PREFIX}{channel}")
            } else {
                channel.clone()
            }
        })
        .collect();

    Ok(TokenClaims {
        channels,
        issued_at: raw.iat,
        expires_at: raw.exp,
    })
}
