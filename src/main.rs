mod config;

use std::sync::Arc;

use push_stream::{EventSourceClient, IncomingNotification, PushManager, StreamEvent};
use push_stream_auth::HttpAuthClient;
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load()?;

    tracing::info!(
        streaming_url = %config.streaming.streaming_url,
        auth_url = %config.auth.auth_url,
        backoff_base_ms = config.streaming.backoff_base_ms,
        read_timeout_ms = config.streaming.read_timeout_ms,
        "Push listener starting"
    );

    let client = Arc::new(EventSourceClient::new(config.streaming.clone())?);
    let auth = Arc::new(HttpAuthClient::new(config.auth.clone())?);
    let manager = PushManager::new(&config.streaming, auth, client.clone());

    let events = client.events();
    tokio::pin!(events);
    manager.start_sse().await;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.next() => match event {
                Some(event) => log_event(&event),
                None => break,
            },
        }
    }

    manager.stop_sse();
    tracing::info!("Push listener shutdown complete");
    Ok(())
}

fn log_event(event: &StreamEvent) {
    match event {
        StreamEvent::Connected => tracing::info!("Streaming connected"),
        StreamEvent::Disconnected { reconnect } => {
            tracing::info!(reconnect, "Streaming disconnected");
        }
        StreamEvent::NotificationReceived(IncomingNotification::Update { channel, payload }) => {
            tracing::info!(%channel, %payload, "Configuration update");
        }
        StreamEvent::NotificationReceived(IncomingNotification::Occupancy { channel, publishers }) => {
            tracing::info!(%channel, publishers, "Occupancy");
        }
        StreamEvent::NotificationReceived(IncomingNotification::Control { channel, directive }) => {
            tracing::info!(%channel, ?directive, "Control");
        }
        StreamEvent::NotificationReceived(IncomingNotification::Error(err)) => {
            tracing::warn!(error = %err, retryable = err.is_retryable(), "Push error");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "push_listener=info,push_stream=info,push_stream_auth=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
