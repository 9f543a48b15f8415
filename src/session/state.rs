//! Session connection state.

/// Connection state of a [`Session`](crate::Session).
///
/// Exactly one value is current at any instant. `Disconnected` is the
/// initial state and the only quiescent one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum SessionState {
    /// No connection attempt in progress.
    #[default]
    Disconnected,
    /// Transport `connect()` issued, waiting for the `connected` event.
    Connecting,
    /// Transport reported the connection open. Heartbeat is running.
    Connected,
    /// Teardown in progress.
    Disconnecting,
}

impl SessionState {
    /// Check if heartbeat pings may be sent in this state.
    #[must_use]
    #[inline]
    pub const fn can_ping(&self) -> bool {
        matches!(self, SessionState::Connected)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "Disconnected"),
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::Connected => write!(f, "Connected"),
            SessionState::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}
