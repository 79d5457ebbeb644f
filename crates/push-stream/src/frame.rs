//! Splits the streamed byte sequence into frames

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::error::{Error, Result};

const FRAME_DELIMITER: &[u8] = b"\n\n";

/// Accumulates bytes across reads and yields complete frames.
///
/// Frames are separated by a blank line. Heartbeats (blank or comment-only
/// frames such as `:keepalive`) are dropped here and never reach a parser.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_frame_bytes: usize,
    heartbeats: u64,
}

impl FrameDecoder {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_frame_bytes,
            heartbeats: 0,
        }
    }

    /// Append a chunk and return every frame it completed, in arrival order
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.extend_normalized(chunk);

        let mut frames = Vec::new();
        while let Some(end) = find(&self.buffer, FRAME_DELIMITER) {
            let raw = self.buffer.split_to(end);
            self.buffer.advance(FRAME_DELIMITER.len());

            match std::str::from_utf8(&raw) {
                Ok(text) if is_heartbeat(text) => {
                    self.heartbeats += 1;
                    trace!("Keep-alive frame");
                }
                Ok(text) => frames.push(text.to_string()),
                Err(e) => debug!(error = %e, "Skipping frame with invalid UTF-8"),
            }
        }

        if self.buffer.len() > self.max_frame_bytes {
            return Err(Error::FrameTooLarge {
                limit: self.max_frame_bytes,
            });
        }

        Ok(frames)
    }

    /// Number of heartbeat frames dropped so far
    pub fn heartbeats(&self) -> u64 {
        self.heartbeats
    }

    /// Bytes waiting for the rest of their frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn extend_normalized(&mut self, chunk: &[u8]) {
        // A CR split from its LF across chunks is dropped on its own.
        self.buffer.reserve(chunk.len());
        for part in chunk.split(|byte| *byte == b'\r') {
            self.buffer.extend_from_slice(part);
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn is_heartbeat(frame: &str) -> bool {
    frame
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with(':'))
}
