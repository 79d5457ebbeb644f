//! Error types for push-stream

use std::time::Duration;

use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while streaming
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport errors (connect, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The streaming endpoint answered with a non-success status
    #[error("Unexpected HTTP status: {0}")]
    Status(reqwest::StatusCode),

    /// No bytes arrived within the inactivity window
    #[error("Streaming read timed out after {0:?}")]
    ReadTimeout(Duration),

    /// The server closed the stream
    #[error("Streaming reached end of stream")]
    EndOfStream,

    /// The session was cancelled by a disconnect
    #[error("Streaming session cancelled")]
    Cancelled,

    /// A single frame grew beyond the configured limit
    #[error("Frame exceeds {limit} bytes")]
    FrameTooLarge {
        /// Configured limit in bytes
        limit: usize,
    },

    /// Header value could not be encoded
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    /// Authentication collaborator errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
