//! Error types for the session manager.
//!
//! Every failure the session can observe is described here. None of them are
//! fatal: they are returned to the caller and, where a lifecycle consumer is
//! registered, reported to it as well.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], as reported to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// `connect` was called without a usable endpoint.
    RequestError,
    /// A send was attempted while no connection is owned.
    SocketAbsent,
    /// A send was attempted with an empty payload.
    MessageEmpty,
    /// The transport reported an error; the session is now disconnected.
    Disconnected,
    /// The transport reported cancellation; the session is now disconnected.
    DidCancel,
    /// No pong arrived within the configured ping timeout.
    PingTimeout,
    /// A configuration value was rejected.
    InvalidConfig,
    /// No async runtime was available to drive timers.
    Runtime,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::RequestError => "RequestError",
            ErrorKind::SocketAbsent => "SocketAbsent",
            ErrorKind::MessageEmpty => "MessageEmpty",
            ErrorKind::Disconnected => "Disconnected",
            ErrorKind::DidCancel => "DidCancel",
            ErrorKind::PingTimeout => "PingTimeout",
            ErrorKind::InvalidConfig => "InvalidConfig",
            ErrorKind::Runtime => "Runtime",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during session operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The connect request has no usable endpoint.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No transport connection is owned by the session.
    #[error("No socket: the session does not own a connection")]
    SocketAbsent,

    /// Outgoing message payload is empty.
    #[error("Message is empty")]
    MessageEmpty,

    /// Transport-level failure reported by the adapter.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The transport cancelled the connection.
    #[error("Connection cancelled")]
    Cancelled,

    /// Heartbeat saw no pong within the timeout window.
    #[error("Ping timeout: no pong for {elapsed:?} (timeout: {timeout:?})")]
    PingTimeout {
        /// Time since the outstanding ping was first sent.
        elapsed: Duration,
        /// Configured timeout.
        timeout: Duration,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No tokio runtime to spawn timers on.
    #[error("No tokio runtime available: {0}")]
    Runtime(String),
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidRequest(_) => ErrorKind::RequestError,
            Error::SocketAbsent => ErrorKind::SocketAbsent,
            Error::MessageEmpty => ErrorKind::MessageEmpty,
            Error::Transport(_) => ErrorKind::Disconnected,
            Error::Cancelled => ErrorKind::DidCancel,
            Error::PingTimeout { .. } => ErrorKind::PingTimeout,
            Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Error::Runtime(_) => ErrorKind::Runtime,
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidRequest(err.to_string())
    }
}

impl From<tokio::runtime::TryCurrentError> for Error {
    fn from(err: tokio::runtime::TryCurrentError) -> Self {
        Error::Runtime(err.to_string())
    }
}
