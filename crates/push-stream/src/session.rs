//! One physical streaming HTTP connection
//!
//! [`StreamingHttpSession`] opens a single `GET` with `Accept:
//! text/event-stream` and hands back a [`SessionStream`] as soon as the
//! response headers arrive. Every read races the body against the
//! inactivity timeout and the session's cancellation token.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::frame::FrameDecoder;

/// Where and how to open a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTarget {
    pub url: String,
    /// Sent as `Authorization: Bearer <token>`
    pub bearer_token: Option<String>,
    /// Sent comma-joined as the `channels` query parameter
    pub channels: Vec<String>,
}

impl StreamTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bearer_token: None,
            channels: Vec::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_channels(mut self, channels: Vec<String>) -> Self {
        self.channels = channels;
        self
    }
}

impl From<&str> for StreamTarget {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for StreamTarget {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

/// Owns one streaming request/response cycle
#[derive(Debug)]
pub struct StreamingHttpSession {
    client: reqwest::Client,
    cancel: CancellationToken,
    max_frame_bytes: usize,
}

impl StreamingHttpSession {
    pub fn new(client: reqwest::Client, cancel: CancellationToken, max_frame_bytes: usize) -> Self {
        Self {
            client,
            cancel,
            max_frame_bytes,
        }
    }

    /// Send the request and wait for the response headers.
    ///
    /// Returns [`Error::Cancelled`] if the session is closed while the
    /// request is in flight.
    pub async fn open(&self, target: &StreamTarget) -> Result<SessionStream> {
        let mut request = self
            .client
            .get(&target.url)
            .headers(stream_headers());

        if let Some(token) = &target.bearer_token {
            request = request.bearer_auth(token);
        }
        if !target.channels.is_empty() {
            request = request.query(&[("channels", target.channels.join(","))]);
        }

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            response = request.send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status(status));
        }

        debug!(url = %target.url, %status, "Streaming response headers received");

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::from))
            .boxed();

        Ok(SessionStream::new(body, self.cancel.clone(), self.max_frame_bytes))
    }

    /// Cancel the session. Safe to call repeatedly and while a read is pending.
    pub fn close(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.cancel.cancel();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

fn stream_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers
}

/// The body of an open session, decoded into frames
pub struct SessionStream {
    body: BoxStream<'static, Result<Bytes>>,
    decoder: FrameDecoder,
    cancel: CancellationToken,
}

impl SessionStream {
    /// Wrap any byte stream; used by [`StreamingHttpSession::open`] and tests
    pub fn new(
        body: BoxStream<'static, Result<Bytes>>,
        cancel: CancellationToken,
        max_frame_bytes: usize,
    ) -> Self {
        Self {
            body,
            decoder: FrameDecoder::new(max_frame_bytes),
            cancel,
        }
    }

    /// Perform one bounded read and return the frames it completed.
    ///
    /// The result may be empty when the chunk only carried a heartbeat or
    /// part of a frame. Timeout, end of stream and cancellation are errors;
    /// none of them is retried here.
    pub async fn read_frames(&mut self, read_timeout: Duration) -> Result<Vec<String>> {
        let chunk = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            chunk = tokio::time::timeout(read_timeout, self.body.next()) => chunk,
        };

        match chunk {
            Err(_) => Err(Error::ReadTimeout(read_timeout)),
            Ok(None) => Err(Error::EndOfStream),
            Ok(Some(Err(e))) => Err(e),
            Ok(Some(Ok(bytes))) if bytes.is_empty() => Err(Error::EndOfStream),
            Ok(Some(Ok(bytes))) => self.decoder.push(&bytes),
        }
    }

    /// Heartbeats dropped on this stream
    pub fn heartbeats(&self) -> u64 {
        self.decoder.heartbeats()
    }
}

impl std::fmt::Debug for SessionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStream")
            .field("decoder", &self.decoder)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
