//! HTTP authentication adapter for push-stream
//!
//! [`HttpAuthClient`] calls the push authentication endpoint with the SDK
//! key and turns the answer into an [`AuthResult`](push_stream::AuthResult):
//! channels and expiration are read from the granted token.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use push_stream::{EventSourceClient, PushManager, StreamingConfig};
//! use push_stream_auth::{HttpAuthClient, HttpAuthConfig};
//!
//! let auth = HttpAuthClient::new(HttpAuthConfig::new("https://auth.example.com/api/v2/auth", "sdk-key"))?;
//! let config = StreamingConfig::new("https://streaming.example.com/sse");
//! let client = Arc::new(EventSourceClient::new(config.clone())?);
//! PushManager::new(&config, Arc::new(auth), client).start_sse().await;
//! ```

mod client;
mod config;
mod token;

pub use client::HttpAuthClient;
pub use config::HttpAuthConfig;
pub use token::{decode_token, TokenClaims};
