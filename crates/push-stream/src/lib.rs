//! # Push Stream
//!
//! The real-time update channel of a feature-flag SDK: keeps a long-lived
//! Server-Sent Events connection to a push service and turns its frames into
//! typed notifications.
//!
//! ## Components
//!
//! - [`BackOff`]: exponential delay between attempts
//! - [`NotificationParser`]: frame → [`IncomingNotification`] or classified error
//! - [`StreamingHttpSession`]: one physical `GET` with bounded, cancellable reads
//! - [`EventSourceClient`]: connection state machine with backoff-governed reconnects
//! - [`PushManager`]: authenticates, starts/stops streaming, refreshes tokens
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use push_stream::{EventSourceClient, StreamEvent, StreamingConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = EventSourceClient::new(StreamingConfig::new("https://streaming.example.com/sse"))?;
//!     let mut events = client.subscribe();
//!
//!     tokio::spawn(client.connect("https://streaming.example.com/sse?channels=updates"));
//!
//!     while let Ok(event) = events.recv().await {
//!         if let StreamEvent::NotificationReceived(notification) = event {
//!             println!("{notification:?}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## With Authentication
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use push_stream::{EventSourceClient, PushManager, StreamingConfig};
//!
//! let config = StreamingConfig::new("https://streaming.example.com/sse");
//! let client = Arc::new(EventSourceClient::new(config.clone())?);
//! let manager = PushManager::new(&config, Arc::new(my_auth_client), client.clone());
//!
//! manager.start_sse().await;
//! // ...
//! manager.stop_sse();
//! ```

pub mod auth;
mod backoff;
mod config;
mod error;
mod event;
mod event_source;
mod frame;
pub mod notification;
mod push_manager;
mod session;
mod sync;

// Re-exports
pub use auth::{AuthClient, AuthResult};
pub use backoff::BackOff;
pub use config::StreamingConfig;
pub use error::{Error, Result};
pub use event::{ConnectionStatus, StreamEvent};
pub use event_source::{EventSourceClient, SessionInfo};
pub use frame::FrameDecoder;
pub use notification::{
    ControlDirective, DefaultNotificationParser, IncomingNotification, NotificationError,
    NotificationParser, ParseError,
};
pub use push_manager::{PushManager, StreamController};
pub use session::{SessionStream, StreamTarget, StreamingHttpSession};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
