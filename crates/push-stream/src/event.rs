//! Lifecycle events and connection status

use crate::notification::IncomingNotification;

/// Events emitted by the streaming client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Response headers received; the stream is being read
    Connected,
    /// The session ended. `reconnect` tells whether streaming is expected to resume.
    Disconnected { reconnect: bool },
    /// A notification decoded from the stream
    NotificationReceived(IncomingNotification),
}

/// Status of the streaming connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    /// Allowed moves: Disconnected -> Connecting -> Connected -> Disconnected,
    /// plus Connecting -> Disconnected for failed opens.
    pub fn can_transition_to(self, next: ConnectionStatus) -> bool {
        use ConnectionStatus::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
        )
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        };
        f.write_str(name)
    }
}
