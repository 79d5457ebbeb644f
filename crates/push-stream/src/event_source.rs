//! Streaming client: one logical connection at a time
//!
//! [`EventSourceClient::connect`] runs connection attempts until the
//! connection is explicitly stopped. Every attempt waits for the next
//! backoff interval, opens a [`StreamingHttpSession`], and reads frames
//! until the transport fails. Transport failures loop back into another
//! attempt; server-pushed errors and [`EventSourceClient::disconnect`] end
//! the logical connection.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backoff::BackOff;
use crate::config::StreamingConfig;
use crate::error::{Error, Result};
use crate::event::{ConnectionStatus, StreamEvent};
use crate::notification::{
    DefaultNotificationParser, IncomingNotification, NotificationParser, ParseError,
};
use crate::push_manager::StreamController;
use crate::session::{SessionStream, StreamTarget, StreamingHttpSession};
use crate::sync::Mutex;

/// Metadata about the active session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Unique session ID
    pub id: Uuid,
    /// URL the session was opened against
    pub url: String,
    /// When the attempt started
    pub opened_at: DateTime<Utc>,
}

impl SessionInfo {
    fn new(url: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.to_string(),
            opened_at: Utc::now(),
        }
    }
}

/// The per-attempt handle. Torn down exactly once.
struct SessionHandle {
    info: SessionInfo,
    cancel: CancellationToken,
}

enum Attempt {
    Retry,
    Stop,
}

/// Streaming client with backoff-governed reconnection
#[derive(Clone)]
pub struct EventSourceClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: StreamingConfig,
    http: reqwest::Client,
    parser: Arc<dyn NotificationParser>,
    backoff: Mutex<BackOff>,
    status: Mutex<ConnectionStatus>,
    session: Mutex<Option<SessionHandle>>,
    /// Parent of every pending or running logical connection
    lifecycle: Mutex<CancellationToken>,
    /// Held for the whole life of a logical connection
    cycle: tokio::sync::Mutex<()>,
    events: broadcast::Sender<StreamEvent>,
}

impl EventSourceClient {
    /// Create a client that parses frames with [`DefaultNotificationParser`]
    pub fn new(config: StreamingConfig) -> Result<Self> {
        Self::with_parser(config, DefaultNotificationParser)
    }

    /// Create a client with a custom frame parser
    pub fn with_parser(config: StreamingConfig, parser: impl NotificationParser) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;
        let (events, _) = broadcast::channel(config.event_channel_capacity);
        let backoff = BackOff::new(config.backoff_base(), config.backoff_max());

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                http,
                parser: Arc::new(parser),
                backoff: Mutex::new(backoff),
                status: Mutex::new(ConnectionStatus::Disconnected),
                session: Mutex::new(None),
                lifecycle: Mutex::new(CancellationToken::new()),
                cycle: tokio::sync::Mutex::new(()),
                events,
            }),
        })
    }

    /// Start a logical connection.
    ///
    /// The returned future waits for any previous logical connection on
    /// this client to wind down, then runs attempts until the connection is
    /// stopped. A [`disconnect`](Self::disconnect) issued after this call
    /// also cancels the pending connection, even before it is polled.
    pub fn connect(&self, target: impl Into<StreamTarget>) -> impl Future<Output = ()> + Send + 'static {
        let client = self.clone();
        let run = self.inner.lifecycle.lock().child_token();
        let target = target.into();
        async move { client.run(target, run).await }
    }

    /// Stop the logical connection and tear down the active session.
    ///
    /// `Disconnected { reconnect }` is emitted only when no backoff streak
    /// is in progress. Calling this again is a no-op.
    pub fn disconnect(&self, reconnect: bool) {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            lifecycle.cancel();
            *lifecycle = CancellationToken::new();
        }
        self.teardown(None, reconnect);
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status.lock()
    }

    /// Metadata of the active session, if any
    pub fn session_info(&self) -> Option<SessionInfo> {
        self.inner.session.lock().as_ref().map(|handle| handle.info.clone())
    }

    /// Current number of consecutive attempts since the last successful connect
    pub fn attempt_count(&self) -> u32 {
        self.inner.backoff.lock().attempt_count()
    }

    /// Subscribe to lifecycle and notification events
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.inner.events.subscribe()
    }

    /// Events as a stream. Lagging subscribers skip missed events.
    pub fn events(&self) -> impl Stream<Item = StreamEvent> + Send + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(|item| match item {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Stream event subscriber lagging");
                None
            }
        })
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.inner.config
    }

    async fn run(self, target: StreamTarget, run: CancellationToken) {
        let _cycle = tokio::select! {
            biased;
            _ = run.cancelled() => {
                debug!(url = %target.url, "Connect cancelled while waiting for previous connection");
                return;
            }
            guard = self.inner.cycle.lock() => guard,
        };

        if run.is_cancelled() {
            return;
        }

        info!(url = %target.url, channels = ?target.channels, "Starting streaming connection");
        while let Attempt::Retry = self.attempt(&target, &run).await {}
        debug!(url = %target.url, "Streaming connection finished");
    }

    async fn attempt(&self, target: &StreamTarget, run: &CancellationToken) -> Attempt {
        let delay = self.inner.backoff.lock().next_interval();
        debug!(delay_ms = delay.as_millis() as u64, "Waiting before connection attempt");
        tokio::select! {
            biased;
            _ = run.cancelled() => return Attempt::Stop,
            _ = tokio::time::sleep(delay) => {}
        }

        let cancel = run.child_token();
        let info = SessionInfo::new(&target.url);
        let stale = self.inner.session.lock().replace(SessionHandle {
            info: info.clone(),
            cancel: cancel.clone(),
        });
        if let Some(stale) = stale {
            warn!(session_id = %stale.info.id, "Replacing a session that was not torn down");
            stale.cancel.cancel();
        }
        self.transition(ConnectionStatus::Connecting);

        let session = StreamingHttpSession::new(
            self.inner.http.clone(),
            cancel.clone(),
            self.inner.config.max_frame_bytes,
        );

        let mut stream = match session.open(target).await {
            Ok(stream) => stream,
            Err(Error::Cancelled) => {
                self.teardown(Some(info.id), false);
                return Attempt::Stop;
            }
            Err(e) => {
                warn!(url = %target.url, error = %e, "Failed to open streaming connection");
                self.teardown(Some(info.id), true);
                return Attempt::Retry;
            }
        };

        if cancel.is_cancelled() || !self.transition(ConnectionStatus::Connected) {
            session.close();
            return Attempt::Stop;
        }

        self.inner.backoff.lock().reset();
        info!(url = %target.url, session_id = %info.id, "Connected to streaming endpoint");
        self.emit(StreamEvent::Connected);

        let outcome = self.read_loop(&mut stream, &cancel, &info).await;
        session.close();
        outcome
    }

    async fn read_loop(
        &self,
        stream: &mut SessionStream,
        cancel: &CancellationToken,
        info: &SessionInfo,
    ) -> Attempt {
        let read_timeout = self.inner.config.read_timeout();

        while !cancel.is_cancelled() && self.is_connected() {
            let frames = match stream.read_frames(read_timeout).await {
                Ok(frames) => frames,
                Err(Error::Cancelled) => return Attempt::Stop,
                Err(e) => {
                    warn!(url = %info.url, error = %e, "Streaming read failed");
                    self.teardown(Some(info.id), true);
                    return Attempt::Retry;
                }
            };

            for frame in frames {
                if cancel.is_cancelled() {
                    return Attempt::Stop;
                }
                match self.inner.parser.parse(&frame) {
                    Ok(notification) => {
                        debug!(?notification, "Notification received");
                        self.emit(StreamEvent::NotificationReceived(notification));
                    }
                    Err(ParseError::Notification(err)) => {
                        let reconnect = err.is_retryable();
                        warn!(
                            status_code = err.status_code,
                            code = err.code,
                            reconnect,
                            message = %err.message,
                            "Push service reported an error"
                        );
                        self.disconnect(reconnect);
                        self.emit(StreamEvent::NotificationReceived(IncomingNotification::Error(err)));
                        return Attempt::Stop;
                    }
                    Err(e) => debug!(error = %e, "Skipping frame"),
                }
            }
        }

        debug!(session_id = %info.id, heartbeats = stream.heartbeats(), "Stopped reading stream");
        Attempt::Stop
    }

    /// Tear down the active session (or only `session_id`, when given)
    fn teardown(&self, session_id: Option<Uuid>, reconnect: bool) -> bool {
        let handle = {
            let mut slot = self.inner.session.lock();
            let superseded = matches!(
                (slot.as_ref(), session_id),
                (Some(active), Some(id)) if active.info.id != id
            );
            if superseded {
                None
            } else {
                slot.take()
            }
        };
        let Some(handle) = handle else {
            return false;
        };

        handle.cancel.cancel();
        self.transition(ConnectionStatus::Disconnected);

        let attempt = self.attempt_count();
        if attempt == 0 {
            self.emit(StreamEvent::Disconnected { reconnect });
        } else {
            debug!(attempt, "Disconnected during backoff streak; event suppressed");
        }

        info!(
            url = %handle.info.url,
            session_id = %handle.info.id,
            reconnect,
            "Disconnected from streaming endpoint"
        );
        true
    }

    fn transition(&self, next: ConnectionStatus) -> bool {
        let mut status = self.inner.status.lock();
        if *status == next {
            return true;
        }
        if !status.can_transition_to(next) {
            debug!(from = %*status, to = %next, "Status transition rejected");
            return false;
        }
        *status = next;
        true
    }

    fn emit(&self, event: StreamEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }
}

impl StreamController for EventSourceClient {
    fn start(&self, token: &str, channels: &[String]) {
        let target = StreamTarget::new(self.inner.config.streaming_url.clone())
            .with_token(token)
            .with_channels(channels.to_vec());

        // A running connection still holds the previous token
        self.disconnect(true);
        tokio::spawn(self.connect(target));
    }

    fn stop(&self) {
        self.disconnect(false);
    }

    fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        EventSourceClient::subscribe(self)
    }
}

impl std::fmt::Debug for EventSourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSourceClient")
            .field("status", &self.status())
            .field("attempt", &self.attempt_count())
            .field("session", &self.session_info())
            .finish()
    }
}
