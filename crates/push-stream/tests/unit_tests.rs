//! Unit tests for push-stream

use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use push_stream::{
    BackOff, ConnectionStatus, ControlDirective, DefaultNotificationParser, Error,
    IncomingNotification, NotificationParser, ParseError, SessionStream, StreamTarget,
    StreamingConfig, StreamingHttpSession,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

fn parse(frame: &str) -> Result<IncomingNotification, ParseError> {
    DefaultNotificationParser.parse(frame)
}

// ============== BackOff Tests ==============

#[test]
fn test_backoff_non_decreasing_and_reset() {
    let mut backoff = BackOff::new(Duration::from_millis(250), Duration::from_secs(30));

    let first = backoff.next_interval();
    let mut previous = first;
    for _ in 0..20 {
        let next = backoff.next_interval();
        assert!(next >= previous);
        previous = next;
    }
    assert_eq!(backoff.attempt_count(), 21);

    backoff.reset();
    assert_eq!(backoff.attempt_count(), 0);
    assert_eq!(backoff.next_interval(), first);
}

#[test]
fn test_backoff_attempt_count_is_pure() {
    let mut backoff = BackOff::new(Duration::from_secs(1), Duration::from_secs(8));
    backoff.next_interval();
    assert_eq!(backoff.attempt_count(), 1);
    assert_eq!(backoff.attempt_count(), 1);
}

// ============== NotificationParser Tests ==============

#[test]
fn test_parse_plain_data_is_update() {
    let notification = parse("data:update").unwrap();
    assert_eq!(
        notification,
        IncomingNotification::Update {
            channel: String::new(),
            payload: "update".to_string(),
        }
    );
}

#[test]
fn test_parse_envelope_update() {
    let frame = r#"id:abc
event:message
data:{"id":"abc","channel":"xxxx_splits","timestamp":1591996685190,"encoding":"json","data":"{\"type\":\"SPLIT_UPDATE\",\"changeNumber\":1591996685190}"}"#;

    let notification = parse(frame).unwrap();
    assert_eq!(
        notification,
        IncomingNotification::Update {
            channel: "xxxx_splits".to_string(),
            payload: r#"{"type":"SPLIT_UPDATE","changeNumber":1591996685190}"#.to_string(),
        }
    );
    assert_eq!(notification.channel(), Some("xxxx_splits"));
}

#[test]
fn test_parse_occupancy() {
    let frame = r#"event:message
data:{"id":"x","channel":"[?occupancy=metrics.publishers]control_pri","name":"[meta]occupancy","data":"{\"metrics\":{\"publishers\":2}}"}"#;

    assert_eq!(
        parse(frame).unwrap(),
        IncomingNotification::Occupancy {
            channel: "control_pri".to_string(),
            publishers: 2,
        }
    );
}

#[test]
fn test_parse_control() {
    let frame = r#"data:{"channel":"control_pri","data":"{\"type\":\"CONTROL\",\"controlType\":\"STREAMING_PAUSED\"}"}"#;

    assert_eq!(
        parse(frame).unwrap(),
        IncomingNotification::Control {
            channel: "control_pri".to_string(),
            directive: ControlDirective::StreamingPaused,
        }
    );
}

#[test]
fn test_parse_unknown_control_type() {
    let frame = r#"data:{"channel":"control_pri","data":"{\"type\":\"CONTROL\",\"controlType\":\"SOMETHING_NEW\"}"}"#;

    match parse(frame).unwrap() {
        IncomingNotification::Control { directive, .. } => {
            assert_eq!(directive, ControlDirective::Other("SOMETHING_NEW".to_string()));
        }
        other => panic!("unexpected notification: {other:?}"),
    }
}

#[test]
fn test_parse_multiline_data_is_joined() {
    let notification = parse("data:first\ndata: second").unwrap();
    assert_eq!(
        notification,
        IncomingNotification::Update {
            channel: String::new(),
            payload: "first\nsecond".to_string(),
        }
    );
}

#[test]
fn test_parse_token_error_is_retryable() {
    let frame = r#"event:error
data:{"message":"Token expired","code":40142,"statusCode":401,"href":"https://help.example.com/40142"}"#;

    match parse(frame) {
        Err(ParseError::Notification(err)) => {
            assert_eq!(err.status_code, 401);
            assert_eq!(err.code, 40142);
            assert_eq!(err.message, "Token expired");
            assert!(err.is_retryable());
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[test]
fn test_parse_server_failure_is_retryable() {
    let frame = r#"event:error
data:{"message":"Internal error","code":50000,"statusCode":500}"#;

    match parse(frame) {
        Err(ParseError::Notification(err)) => assert!(err.is_retryable()),
        other => panic!("expected server error, got {other:?}"),
    }
}

#[test]
fn test_parse_client_error_is_fatal() {
    let frame = r#"event:error
data:{"message":"Forbidden","code":40300,"statusCode":403}"#;

    let err = parse(frame).unwrap_err();
    assert!(!err.is_skippable());
    match err {
        ParseError::Notification(err) => assert!(!err.is_retryable()),
        other => panic!("expected server error, got {other:?}"),
    }
}

#[test]
fn test_parse_unstructured_error_is_retryable() {
    match parse("event:error\ndata:connection reset") {
        Err(ParseError::Notification(err)) => {
            assert_eq!(err.status_code, 0);
            assert_eq!(err.message, "connection reset");
            assert!(err.is_retryable());
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[test]
fn test_parse_empty_frames_are_skippable() {
    for frame in ["", "   ", "\n", ":keepalive"] {
        let err = parse(frame).unwrap_err();
        assert!(matches!(err, ParseError::Empty), "frame {frame:?}");
        assert!(err.is_skippable());
    }
}

#[test]
fn test_parse_frame_without_data_is_malformed() {
    let err = parse("id:1\nevent:message").unwrap_err();
    assert!(matches!(err, ParseError::Malformed(_)));
    assert!(err.is_skippable());
}

#[test]
fn test_parse_bad_occupancy_payload_is_malformed() {
    let frame = r#"data:{"channel":"control_pri","name":"[meta]occupancy","data":"not json"}"#;
    assert!(matches!(parse(frame), Err(ParseError::Malformed(_))));
}

// ============== ConnectionStatus Tests ==============

#[test]
fn test_status_transition_table() {
    use ConnectionStatus::*;

    assert!(Disconnected.can_transition_to(Connecting));
    assert!(Connecting.can_transition_to(Connected));
    assert!(Connecting.can_transition_to(Disconnected));
    assert!(Connected.can_transition_to(Disconnected));

    assert!(!Disconnected.can_transition_to(Connected));
    assert!(!Connected.can_transition_to(Connecting));
    assert_eq!(ConnectionStatus::default(), Disconnected);
}

// ============== StreamingConfig Tests ==============

#[test]
fn test_config_defaults() {
    let config = StreamingConfig::new("https://streaming.example.com/sse");
    assert_eq!(config.read_timeout(), Duration::from_secs(70));
    assert_eq!(config.backoff_base(), Duration::from_secs(1));
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation() {
    assert!(matches!(StreamingConfig::default().validate(), Err(Error::Config(_))));

    let mut config = StreamingConfig::new("ftp://streaming.example.com");
    assert!(config.validate().is_err());

    config.streaming_url = "http://localhost/sse".to_string();
    config.backoff_max_ms = 10;
    config.backoff_base_ms = 100;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_deserialize_with_defaults() {
    let config: StreamingConfig =
        serde_json::from_str(r#"{"streaming_url":"http://localhost/sse","backoff_base_ms":50}"#).unwrap();
    assert_eq!(config.backoff_base(), Duration::from_millis(50));
    assert_eq!(config.read_timeout_ms, 70_000);
    assert_eq!(config.event_channel_capacity, 256);
}

// ============== SessionStream Tests ==============

fn memory_stream(cancel: &CancellationToken) -> (mpsc::Sender<push_stream::Result<Bytes>>, SessionStream) {
    let (tx, rx) = mpsc::channel(8);
    let stream = SessionStream::new(ReceiverStream::new(rx).boxed(), cancel.clone(), 1024);
    (tx, stream)
}

#[tokio::test]
async fn test_session_stream_splits_frames_in_order() {
    let cancel = CancellationToken::new();
    let (tx, mut stream) = memory_stream(&cancel);

    tx.send(Ok(Bytes::from_static(b"data:one\n\ndata:two\n\nda"))).await.unwrap();
    let frames = stream.read_frames(Duration::from_secs(1)).await.unwrap();
    assert_eq!(frames, vec!["data:one".to_string(), "data:two".to_string()]);

    tx.send(Ok(Bytes::from_static(b"ta:three\n\n"))).await.unwrap();
    let frames = stream.read_frames(Duration::from_secs(1)).await.unwrap();
    assert_eq!(frames, vec!["data:three".to_string()]);
}

#[tokio::test]
async fn test_session_stream_drops_heartbeats() {
    let cancel = CancellationToken::new();
    let (tx, mut stream) = memory_stream(&cancel);

    tx.send(Ok(Bytes::from_static(b":keepalive\n\n"))).await.unwrap();
    assert!(stream.read_frames(Duration::from_secs(1)).await.unwrap().is_empty());
    assert_eq!(stream.heartbeats(), 1);
}

#[tokio::test]
async fn test_session_stream_end_of_stream() {
    let cancel = CancellationToken::new();
    let (tx, mut stream) = memory_stream(&cancel);
    drop(tx);

    let err = stream.read_frames(Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, Error::EndOfStream));
}

#[tokio::test]
async fn test_session_stream_zero_byte_read_is_end_of_stream() {
    let cancel = CancellationToken::new();
    let (tx, mut stream) = memory_stream(&cancel);
    tx.send(Ok(Bytes::new())).await.unwrap();

    let err = stream.read_frames(Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, Error::EndOfStream));
}

#[tokio::test(start_paused = true)]
async fn test_session_stream_read_timeout() {
    let cancel = CancellationToken::new();
    let (_tx, mut stream) = memory_stream(&cancel);

    let started = tokio::time::Instant::now();
    let err = stream.read_frames(Duration::from_secs(70)).await.unwrap_err();
    assert!(matches!(err, Error::ReadTimeout(d) if d == Duration::from_secs(70)));
    assert!(started.elapsed() >= Duration::from_secs(70));
}

#[tokio::test(start_paused = true)]
async fn test_session_stream_cancel_preempts_read_timeout() {
    let cancel = CancellationToken::new();
    let (_tx, mut stream) = memory_stream(&cancel);

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let started = tokio::time::Instant::now();
    let err = stream.read_frames(Duration::from_secs(70)).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_session_stream_oversized_frame() {
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(1);
    let mut stream = SessionStream::new(ReceiverStream::new(rx).boxed(), cancel, 16);

    tx.send(Ok(Bytes::from_static(b"data:this frame never ends"))).await.unwrap();
    let err = stream.read_frames(Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, Error::FrameTooLarge { limit: 16 }));
}

// ============== StreamingHttpSession Tests ==============

#[tokio::test]
async fn test_session_close_is_idempotent() {
    let session = StreamingHttpSession::new(reqwest::Client::new(), CancellationToken::new(), 1024);

    assert!(!session.is_closed());
    assert!(session.close());
    assert!(!session.close());
    assert!(session.is_closed());
}

#[tokio::test]
async fn test_session_open_after_close_is_cancelled() {
    let session = StreamingHttpSession::new(reqwest::Client::new(), CancellationToken::new(), 1024);
    session.close();

    let err = session
        .open(&StreamTarget::new("http://127.0.0.1:9/sse"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[test]
fn test_stream_target_builder() {
    let target = StreamTarget::from("http://localhost/sse")
        .with_token("jwt")
        .with_channels(vec!["a".to_string(), "b".to_string()]);

    assert_eq!(target.url, "http://localhost/sse");
    assert_eq!(target.bearer_token.as_deref(), Some("jwt"));
    assert_eq!(target.channels.len(), 2);
}
