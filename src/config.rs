//! Configuration for session heartbeat supervision.

use std::time::Duration;

use bytes::Bytes;

use crate::error::{Error, Result};

/// Default interval between heartbeat pings.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Default time without a pong before a ping timeout is reported.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(60);

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Interval between heartbeat ticks.
    ///
    /// A tick fires immediately when the heartbeat starts, then once per
    /// interval. Changes take effect from the next heartbeat start.
    ///
    /// Default: 5 seconds
    pub heartbeat_interval: Duration,

    /// Maximum time an outstanding ping may go unanswered.
    ///
    /// Exceeding it reports a ping timeout to the lifecycle consumer. The
    /// session is not disconnected.
    ///
    /// Default: 60 seconds
    pub ping_timeout: Duration,

    /// Payload carried by heartbeat pings.
    ///
    /// Default: empty
    pub ping_payload: Bytes,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            ping_payload: Bytes::new(),
        }
    }
}

impl SessionConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the heartbeat interval.
    #[must_use]
    pub const fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the ping timeout.
    #[must_use]
    pub const fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    /// Set the heartbeat ping payload.
    #[must_use]
    pub fn with_ping_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.ping_payload = payload.into();
        self
    }

    /// Check that both durations are positive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if either duration is zero.
    pub fn validate(&self) -> Result<()> {
        check_positive("heartbeat_interval", self.heartbeat_interval)?;
        check_positive("ping_timeout", self.ping_timeout)
    }
}

pub(crate) fn check_positive(name: &str, value: Duration) -> Result<()> {
    if value.is_zero() {
        Err(Error::InvalidConfig(format!("{name} must be greater than zero")))
    } else {
        Ok(())
    }
}
