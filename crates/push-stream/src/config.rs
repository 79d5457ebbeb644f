//! Streaming configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Settings consumed by the streaming core.
///
/// Durations are expressed in milliseconds so the struct maps directly onto
/// YAML or environment-provided values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Streaming endpoint, e.g. `https://streaming.example.com/sse`
    #[serde(default)]
    pub streaming_url: String,

    /// First reconnect delay; doubles on every failed attempt
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Ceiling for the reconnect delay
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Inactivity window for a single read
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Timeout for establishing the HTTP connection
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// First delay before re-authenticating when the auth response asks for a retry
    #[serde(default = "default_auth_retry_backoff_base_ms")]
    pub auth_retry_backoff_base_ms: u64,

    /// Buffered lifecycle events per subscriber
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Upper bound for a single buffered frame
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

fn default_read_timeout_ms() -> u64 {
    70_000
}

fn default_connect_timeout_ms() -> u64 {
    15_000
}

fn default_auth_retry_backoff_base_ms() -> u64 {
    1_000
}

fn default_event_channel_capacity() -> usize {
    256
}

fn default_max_frame_bytes() -> usize {
    512 * 1024
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            streaming_url: String::new(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            auth_retry_backoff_base_ms: default_auth_retry_backoff_base_ms(),
            event_channel_capacity: default_event_channel_capacity(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl StreamingConfig {
    /// Create a config for the given streaming URL with default timings
    pub fn new(streaming_url: impl Into<String>) -> Self {
        Self {
            streaming_url: streaming_url.into(),
            ..Self::default()
        }
    }

    /// Check that the values can drive a client
    pub fn validate(&self) -> Result<()> {
        if self.streaming_url.is_empty() {
            return Err(Error::Config("streaming_url is required".to_string()));
        }
        if !self.streaming_url.starts_with("http://") && !self.streaming_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "streaming_url must be http(s): {}",
                self.streaming_url
            )));
        }
        if self.backoff_base_ms == 0 {
            return Err(Error::Config("backoff_base_ms must be > 0".to_string()));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(Error::Config(
                "backoff_max_ms must be >= backoff_base_ms".to_string(),
            ));
        }
        if self.read_timeout_ms == 0 {
            return Err(Error::Config("read_timeout_ms must be > 0".to_string()));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::Config(
                "event_channel_capacity must be > 0".to_string(),
            ));
        }
        if self.max_frame_bytes == 0 {
            return Err(Error::Config("max_frame_bytes must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn auth_retry_backoff_base(&self) -> Duration {
        Duration::from_millis(self.auth_retry_backoff_base_ms)
    }
}
