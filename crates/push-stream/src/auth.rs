//! Authentication collaborator seam
//!
//! Implement [`AuthClient`] to obtain streaming tokens from any backend.
//! The HTTP implementation lives in the `push-stream-auth` crate.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Outcome of one authentication call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthResult {
    /// Whether streaming is allowed for this SDK key
    pub push_enabled: bool,
    /// Token to present to the streaming endpoint
    pub token: Option<String>,
    /// Channels granted by the token, in order
    pub channels: Option<Vec<String>>,
    /// Time until the token should be refreshed
    pub expiration: Option<Duration>,
    /// Whether the caller should authenticate again after a backoff delay
    pub retry: Option<bool>,
}

impl AuthResult {
    /// Streaming granted with a token
    pub fn enabled(token: impl Into<String>, channels: Vec<String>, expiration: Duration) -> Self {
        Self {
            push_enabled: true,
            token: Some(token.into()),
            channels: Some(channels),
            expiration: Some(expiration),
            retry: Some(false),
        }
    }

    /// Streaming not available right now
    pub fn disabled(retry: bool) -> Self {
        Self {
            push_enabled: false,
            retry: Some(retry),
            ..Self::default()
        }
    }

    pub fn should_retry(&self) -> bool {
        self.retry.unwrap_or(false)
    }
}

/// Trait for authentication backends
///
/// # Example
///
/// ```rust,ignore
/// use push_stream::{AuthClient, AuthResult, async_trait};
/// use std::time::Duration;
///
/// struct StaticToken(String);
///
/// #[async_trait]
/// impl AuthClient for StaticToken {
///     async fn authenticate(&self) -> push_stream::Result<AuthResult> {
///         Ok(AuthResult::enabled(&self.0, vec!["updates".into()], Duration::from_secs(3600)))
///     }
/// }
/// ```
#[async_trait]
pub trait AuthClient: Send + Sync + 'static {
    /// Request a streaming token
    async fn authenticate(&self) -> Result<AuthResult>;
}
