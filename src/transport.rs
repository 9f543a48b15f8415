//! Transport adapter contract.
//!
//! The session never touches sockets. It drives a [`Transport`] created by a
//! [`TransportFactory`] and learns about the connection exclusively through
//! [`TransportEvent`]s pushed into the [`EventSink`] handed to the factory.
//!
//! ## Re-entrancy
//!
//! The session calls every [`Transport`] method while holding its internal
//! lock. Implementations must therefore never emit events or run send
//! completions synchronously from inside these methods; they hand the work
//! to their own I/O context and report back later, as a socket would.

use std::sync::Weak;

use bytes::Bytes;
use tracing::trace;

use crate::error::{Error, Result};
use crate::request::Request;
use crate::session::{Shared, bridge};

/// Callback run once the transport has finished (or failed) a write.
pub type SendCompletion = Box<dyn FnOnce(Result<()>) + Send + 'static>;

/// Events a transport reports, in order, on a single stream.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum TransportEvent {
    /// Handshake completed; carries the response headers.
    Connected(Vec<(String, String)>),
    /// Connection closed with the given reason and close code.
    Disconnected {
        /// Close reason text.
        reason: String,
        /// Close status code.
        code: u16,
    },
    /// Inbound text message.
    Text(String),
    /// Inbound binary message.
    Binary(Bytes),
    /// Ping received from the peer.
    Ping(Bytes),
    /// Pong received from the peer.
    Pong(Bytes),
    /// Network path availability changed.
    ViabilityChanged(bool),
    /// The transport suggests reconnecting.
    ReconnectSuggested(bool),
    /// Transport-level failure.
    Error(Error),
    /// Connection attempt or connection cancelled.
    Cancelled,
}

impl TransportEvent {
    /// Short name, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            TransportEvent::Connected(_) => "connected",
            TransportEvent::Disconnected { .. } => "disconnected",
            TransportEvent::Text(_) => "text",
            TransportEvent::Binary(_) => "binary",
            TransportEvent::Ping(_) => "ping",
            TransportEvent::Pong(_) => "pong",
            TransportEvent::ViabilityChanged(_) => "viability_changed",
            TransportEvent::ReconnectSuggested(_) => "reconnect_suggested",
            TransportEvent::Error(_) => "error",
            TransportEvent::Cancelled => "cancelled",
        }
    }
}

/// A single WebSocket connection as seen by the session.
pub trait Transport: Send + Sync {
    /// Start (or re-trigger) the connection. Must be idempotent.
    fn connect(&self);

    /// Close the connection, with a close handshake when `graceful`.
    fn disconnect(&self, graceful: bool);

    /// Drop the connection immediately.
    fn force_disconnect(&self) {
        self.disconnect(false);
    }

    /// Queue a text message; `completion` runs once it is written.
    fn send_text(&self, text: String, completion: SendCompletion);

    /// Queue a binary message; `completion` runs once it is written.
    fn send_binary(&self, data: Bytes, completion: SendCompletion);

    /// Queue a ping frame.
    fn send_ping(&self, payload: Bytes);
}

/// Builds a [`Transport`] bound to a request.
pub trait TransportFactory: Send + Sync {
    /// Create a transport for `request`. It must report through `events`.
    fn create(&self, request: &Request, events: EventSink) -> Box<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn(&Request, EventSink) -> Box<dyn Transport> + Send + Sync,
{
    fn create(&self, request: &Request, events: EventSink) -> Box<dyn Transport> {
        self(request, events)
    }
}

/// Where a transport pushes its events.
///
/// Each sink is tied to one transport instance. Once the session no longer
/// owns that instance, events pushed here are discarded.
#[derive(Clone)]
pub struct EventSink {
    connection_id: u64,
    session: Weak<Shared>,
}

impl EventSink {
    pub(crate) fn new(connection_id: u64, session: Weak<Shared>) -> Self {
        Self {
            connection_id,
            session,
        }
    }

    /// Identifier of the transport instance this sink belongs to.
    #[must_use]
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Deliver an event to the session.
    ///
    /// Returns `false` if the session is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        match self.session.upgrade() {
            Some(shared) => {
                bridge::apply(&shared, self.connection_id, event);
                true
            }
            None => {
                trace!(
                    connection_id = self.connection_id,
                    event = event.name(),
                    "session dropped, event discarded"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("connection_id", &self.connection_id)
            .field("attached", &(self.session.strong_count() > 0))
            .finish()
    }
}
