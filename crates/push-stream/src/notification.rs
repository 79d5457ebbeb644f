//! Notification types and the frame parser
//!
//! A frame is one `\n\n`-delimited block of SSE fields. Data frames carry a
//! message envelope (`{"channel", "name", "data"}`) whose inner `data` is
//! classified into updates, occupancy counts, or control directives.
//! Frames with `event: error` are server-pushed errors.

use serde::Deserialize;
use thiserror::Error;

/// Prefix the push service puts in front of occupancy channel names
pub const OCCUPANCY_PREFIX: &str = "[?occupancy=metrics.publishers]";

const OCCUPANCY_EVENT_NAME: &str = "[meta]occupancy";
const TOKEN_ERROR_CODES: std::ops::RangeInclusive<u32> = 40140..=40149;

/// A typed notification decoded from one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingNotification {
    /// A configuration change published on a channel.
    /// `channel` is empty when the frame carried no envelope.
    Update { channel: String, payload: String },
    /// Number of publishers currently attached to a channel
    Occupancy { channel: String, publishers: u32 },
    /// Streaming control directive
    Control {
        channel: String,
        directive: ControlDirective,
    },
    /// Server-pushed error, dispatched just before the client disconnects
    Error(NotificationError),
}

impl IncomingNotification {
    /// Channel the notification was published on, if any
    pub fn channel(&self) -> Option<&str> {
        match self {
            IncomingNotification::Update { channel, .. }
            | IncomingNotification::Occupancy { channel, .. }
            | IncomingNotification::Control { channel, .. } => Some(channel),
            IncomingNotification::Error(_) => None,
        }
    }
}

/// Control directives sent on control channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlDirective {
    StreamingPaused,
    StreamingResumed,
    StreamingDisabled,
    Other(String),
}

impl From<&str> for ControlDirective {
    fn from(value: &str) -> Self {
        match value {
            "STREAMING_PAUSED" => ControlDirective::StreamingPaused,
            "STREAMING_RESUMED" => ControlDirective::StreamingResumed,
            "STREAMING_DISABLED" => ControlDirective::StreamingDisabled,
            other => ControlDirective::Other(other.to_string()),
        }
    }
}

/// Error event pushed by the server
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("push error {status_code} (code {code}): {message}")]
pub struct NotificationError {
    /// HTTP-like status; 0 when the server did not send one
    pub status_code: u16,
    /// Service specific error code
    pub code: u32,
    pub message: String,
    pub href: Option<String>,
}

impl NotificationError {
    /// Whether the caller should reconnect (possibly with a fresh token).
    ///
    /// Server-side failures, token errors and unclassified errors are
    /// retryable; any other client error is fatal for the channel set.
    pub fn is_retryable(&self) -> bool {
        self.status_code == 0
            || self.status_code >= 500
            || TOKEN_ERROR_CODES.contains(&self.code)
    }
}

/// Why a frame did not produce a notification
#[derive(Debug, Error)]
pub enum ParseError {
    /// Nothing but whitespace or comments; skip it
    #[error("empty frame")]
    Empty,
    /// Frame could not be understood; skip it
    #[error("malformed frame: {0}")]
    Malformed(String),
    /// The server pushed an error event
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

impl ParseError {
    /// Skippable failures leave the session running
    pub fn is_skippable(&self) -> bool {
        !matches!(self, ParseError::Notification(_))
    }
}

/// Converts a raw frame into a typed notification
pub trait NotificationParser: Send + Sync + 'static {
    fn parse(&self, frame: &str) -> Result<IncomingNotification, ParseError>;
}

/// Parser for SSE frames carrying push-service message envelopes
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNotificationParser;

impl NotificationParser for DefaultNotificationParser {
    fn parse(&self, frame: &str) -> Result<IncomingNotification, ParseError> {
        if frame.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let fields = SseFields::read(frame);

        if fields.event.as_deref() == Some("error") {
            return Err(ParseError::Notification(error_from_data(
                fields.data.as_deref().unwrap_or_default(),
            )));
        }

        let data = match fields.data {
            Some(data) if !data.trim().is_empty() => data,
            _ if fields.event.is_none() && fields.id.is_none() => return Err(ParseError::Empty),
            _ => return Err(ParseError::Malformed("frame has no data".to_string())),
        };

        match serde_json::from_str::<Envelope>(&data) {
            Ok(envelope) => classify(envelope),
            Err(_) => Ok(IncomingNotification::Update {
                channel: String::new(),
                payload: data,
            }),
        }
    }
}

/// Fields of a single SSE event
#[derive(Debug, Default)]
struct SseFields {
    event: Option<String>,
    data: Option<String>,
    id: Option<String>,
}

impl SseFields {
    fn read(frame: &str) -> Self {
        let mut fields = SseFields::default();
        for line in frame.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let (name, value) = match line.split_once(':') {
                Some((name, value)) => (name, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match name {
                "event" => fields.event = Some(value.to_string()),
                "id" => fields.id = Some(value.to_string()),
                "data" => match fields.data.as_mut() {
                    Some(data) => {
                        data.push('\n');
                        data.push_str(value);
                    }
                    None => fields.data = Some(value.to_string()),
                },
                _ => {}
            }
        }
        fields
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    channel: String,
    #[serde(default)]
    name: Option<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorPayload {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    status_code: u16,
    #[serde(default)]
    href: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OccupancyPayload {
    metrics: OccupancyMetrics,
}

#[derive(Debug, Deserialize)]
struct OccupancyMetrics {
    publishers: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InnerMessage {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    control_type: Option<String>,
}

fn error_from_data(data: &str) -> NotificationError {
    match serde_json::from_str::<ErrorPayload>(data) {
        Ok(payload) => NotificationError {
            status_code: payload.status_code,
            code: payload.code,
            message: payload.message,
            href: payload.href,
        },
        Err(_) => NotificationError {
            status_code: 0,
            code: 0,
            message: data.to_string(),
            href: None,
        },
    }
}

fn classify(envelope: Envelope) -> Result<IncomingNotification, ParseError> {
    let channel = envelope
        .channel
        .strip_prefix(OCCUPANCY_PREFIX)
        .unwrap_or(&envelope.channel)
        .to_string();

    if envelope.name.as_deref() == Some(OCCUPANCY_EVENT_NAME) {
        let payload: OccupancyPayload = serde_json::from_str(&envelope.data)
            .map_err(|e| ParseError::Malformed(format!("occupancy payload: {e}")))?;
        return Ok(IncomingNotification::Occupancy {
            channel,
            publishers: payload.metrics.publishers,
        });
    }

    if let Ok(InnerMessage {
        kind: Some(kind),
        control_type,
    }) = serde_json::from_str::<InnerMessage>(&envelope.data)
    {
        if kind == "CONTROL" {
            let control_type = control_type
                .ok_or_else(|| ParseError::Malformed("control message without controlType".to_string()))?;
            return Ok(IncomingNotification::Control {
                channel,
                directive: ControlDirective::from(control_type.as_str()),
            });
        }
    }

    Ok(IncomingNotification::Update {
        channel,
        payload: envelope.data,
    })
}
