//! Bridges authentication results to the streaming connection

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::AuthClient;
use crate::backoff::BackOff;
use crate::config::StreamingConfig;
use crate::event::StreamEvent;
use crate::notification::IncomingNotification;
use crate::sync::Mutex;

/// What PushManager drives: start streaming with a token, or stop it.
///
/// Implemented by [`EventSourceClient`](crate::EventSourceClient).
/// `start` must not block; it is expected to spawn the connection.
pub trait StreamController: Send + Sync + 'static {
    fn start(&self, token: &str, channels: &[String]);
    fn stop(&self);
    fn subscribe(&self) -> broadcast::Receiver<StreamEvent>;
}

/// Authenticates, starts streaming, and keeps the token fresh
#[derive(Clone)]
pub struct PushManager {
    inner: Arc<PushInner>,
}

struct PushInner {
    auth: Arc<dyn AuthClient>,
    controller: Arc<dyn StreamController>,
    auth_backoff: Mutex<BackOff>,
    /// Parent of pending refresh/retry timers
    timers: Mutex<CancellationToken>,
    /// Watches for retryable server errors while streaming is started
    supervisor: Mutex<Option<CancellationToken>>,
}

impl PushManager {
    pub fn new(
        config: &StreamingConfig,
        auth: Arc<dyn AuthClient>,
        controller: Arc<dyn StreamController>,
    ) -> Self {
        let auth_backoff = BackOff::new(config.auth_retry_backoff_base(), config.backoff_max());
        Self {
            inner: Arc::new(PushInner {
                auth,
                controller,
                auth_backoff: Mutex::new(auth_backoff),
                timers: Mutex::new(CancellationToken::new()),
                supervisor: Mutex::new(None),
            }),
        }
    }

    /// Authenticate and start (or stop) streaming accordingly.
    ///
    /// Schedules a token refresh at the granted expiration, and an
    /// authentication retry when the response asks for one. Timers armed by
    /// an earlier call are cancelled first.
    pub async fn start_sse(&self) {
        let timers = self.rearm_timers();

        let result = match self.inner.auth.authenticate().await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Push authentication failed");
                return;
            }
        };

        if timers.is_cancelled() {
            debug!("Streaming stopped during authentication; ignoring response");
            return;
        }

        if result.push_enabled {
            match result.token.as_deref() {
                Some(token) => {
                    let channels = result.channels.clone().unwrap_or_default();
                    info!(channels = ?channels, "Push enabled, starting streaming");
                    self.ensure_supervisor();
                    self.inner.controller.start(token, &channels);
                    self.inner.auth_backoff.lock().reset();

                    if let Some(expiration) = result.expiration {
                        self.schedule(expiration, "token refresh");
                    }
                }
                None => {
                    warn!("Push enabled without a token, stopping streaming");
                    self.stop_sse();
                }
            }
        } else {
            info!("Push disabled by authentication response");
            self.stop_sse();
        }

        if result.should_retry() {
            let delay = self.inner.auth_backoff.lock().next_interval();
            self.schedule(delay, "authentication retry");
        }
    }

    /// Stop streaming and cancel pending refresh/retry timers
    pub fn stop_sse(&self) {
        {
            let mut timers = self.inner.timers.lock();
            timers.cancel();
            *timers = CancellationToken::new();
        }
        if let Some(supervisor) = self.inner.supervisor.lock().take() {
            supervisor.cancel();
        }
        self.inner.controller.stop();
    }

    fn rearm_timers(&self) -> CancellationToken {
        let mut timers = self.inner.timers.lock();
        timers.cancel();
        *timers = CancellationToken::new();
        timers.clone()
    }

    fn schedule(&self, delay: Duration, reason: &'static str) {
        let cancel = self.inner.timers.lock().child_token();
        let manager = self.clone();

        info!(delay_ms = delay.as_millis() as u64, reason, "Scheduling re-authentication");

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => debug!(reason, "Scheduled re-authentication cancelled"),
                _ = tokio::time::sleep(delay) => manager.start_sse().await,
            }
        });
    }

    fn ensure_supervisor(&self) {
        let cancel = {
            let mut slot = self.inner.supervisor.lock();
            if slot.is_some() {
                return;
            }
            let cancel = CancellationToken::new();
            *slot = Some(cancel.clone());
            cancel
        };

        let mut events = self.inner.controller.subscribe();
        let manager = self.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(StreamEvent::NotificationReceived(IncomingNotification::Error(err)))
                            if err.is_retryable() =>
                        {
                            info!(error = %err, "Re-authenticating after retryable push error");
                            manager.start_sse().await;
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Push supervisor lagging behind stream events");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!("Push supervisor stopped");
        });
    }
}
