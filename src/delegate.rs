//! Consumer-facing notification contracts.
//!
//! Two consumers can be registered on a session, both held weakly:
//!
//! - a lifecycle consumer implementing [`SessionDelegate`], and
//! - a structured-message consumer implementing [`ObjectConsumer`].
//!
//! Every [`SessionDelegate`] method has a no-op default, so implementors only
//! override what they care about. A missing or dropped consumer is not an
//! error; its notifications are discarded.
//!
//! [`ChannelDelegate`] adapts the callback interface to a stream of
//! [`SessionEvent`]s for consumers that prefer `recv().await`.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::dispatch::JsonObject;
use crate::error::{Error, ErrorKind};
use crate::request::Request;

/// An outgoing message payload, echoed back in send results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A text message.
    Text(String),
    /// A binary message.
    Binary(Bytes),
}

impl Payload {
    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(data) => data.len(),
        }
    }

    /// Whether the payload has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lifecycle consumer.
///
/// Callbacks are serialized: they never overlap, and they arrive in the
/// order the session applied the state changes behind them, whichever
/// thread caused each change. They run on a thread that touched the session
/// (a caller, the transport's I/O task, or the heartbeat task) and never
/// while the session's internal lock is held, so calling back into the
/// session from a callback is allowed. Notifications caused by such a call
/// are delivered after the current callback returns.
#[allow(unused_variables)]
pub trait SessionDelegate: Send + Sync {
    /// The transport reported the connection open.
    fn on_connected(&self, endpoint: Option<&Request>) {}

    /// The transport reported the connection closed.
    fn on_disconnected(&self, endpoint: Option<&Request>) {}

    /// A connect request was rejected, or the transport failed or cancelled.
    fn on_connect_error(&self, kind: ErrorKind, cause: Option<&Error>) {}

    /// No pong arrived within the ping timeout. The session stays connected.
    fn on_ping_timeout(&self, endpoint: Option<&Request>) {}

    /// Outcome of a `send_text`/`send_binary` call.
    fn on_send_result(&self, success: bool, error: Option<ErrorKind>, payload: &Payload) {}

    /// A text message arrived.
    fn on_text_message(&self, text: &str) {}

    /// A binary message arrived.
    fn on_binary_message(&self, data: &Bytes) {}

    /// The transport reported the network path as no longer viable.
    fn on_viability_changed(&self) {}
}

/// Structured-message consumer.
pub trait ObjectConsumer: Send + Sync {
    /// An inbound message decoded to a key-value object.
    fn on_decoded_object(&self, object: JsonObject);
}

/// One lifecycle notification.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SessionEvent {
    /// See [`SessionDelegate::on_connected`].
    Connected(Option<Request>),
    /// See [`SessionDelegate::on_disconnected`].
    Disconnected(Option<Request>),
    /// See [`SessionDelegate::on_connect_error`].
    ConnectError {
        /// Error class.
        kind: ErrorKind,
        /// Underlying cause, when one exists.
        cause: Option<Error>,
    },
    /// See [`SessionDelegate::on_ping_timeout`].
    PingTimeout(Option<Request>),
    /// See [`SessionDelegate::on_send_result`].
    SendResult {
        /// Whether the transport accepted the write.
        success: bool,
        /// Failure class when `success` is false.
        error: Option<ErrorKind>,
        /// The payload that was sent.
        payload: Payload,
    },
    /// See [`SessionDelegate::on_text_message`].
    TextMessage(String),
    /// See [`SessionDelegate::on_binary_message`].
    BinaryMessage(Bytes),
    /// See [`SessionDelegate::on_viability_changed`].
    ViabilityChanged,
}

impl SessionEvent {
    /// Invoke the matching callback on `delegate`.
    pub fn notify(&self, delegate: &dyn SessionDelegate) {
        match self {
            SessionEvent::Connected(endpoint) => delegate.on_connected(endpoint.as_ref()),
            SessionEvent::Disconnected(endpoint) => delegate.on_disconnected(endpoint.as_ref()),
            SessionEvent::ConnectError { kind, cause } => {
                delegate.on_connect_error(*kind, cause.as_ref());
            }
            SessionEvent::PingTimeout(endpoint) => delegate.on_ping_timeout(endpoint.as_ref()),
            SessionEvent::SendResult {
                success,
                error,
                payload,
            } => delegate.on_send_result(*success, *error, payload),
            SessionEvent::TextMessage(text) => delegate.on_text_message(text),
            SessionEvent::BinaryMessage(data) => delegate.on_binary_message(data),
            SessionEvent::ViabilityChanged => delegate.on_viability_changed(),
        }
    }

    pub(crate) fn send_failed(kind: ErrorKind, payload: Payload) -> Self {
        SessionEvent::SendResult {
            success: false,
            error: Some(kind),
            payload,
        }
    }
}

/// A [`SessionDelegate`] forwarding every notification into a channel.
///
/// Register the returned `Arc` with the session and keep it alive for as
/// long as events should flow; the session only holds a weak reference.
#[derive(Debug)]
pub struct ChannelDelegate {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelDelegate {
    /// Create a delegate and the receiver its events arrive on.
    #[must_use]
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }

    fn forward(&self, event: SessionEvent) {
        // Receiver gone means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl SessionDelegate for ChannelDelegate {
    fn on_connected(&self, endpoint: Option<&Request>) {
        self.forward(SessionEvent::Connected(endpoint.cloned()));
    }

    fn on_disconnected(&self, endpoint: Option<&Request>) {
        self.forward(SessionEvent::Disconnected(endpoint.cloned()));
    }

    fn on_connect_error(&self, kind: ErrorKind, cause: Option<&Error>) {
        self.forward(SessionEvent::ConnectError {
            kind,
            cause: cause.cloned(),
        });
    }

    fn on_ping_timeout(&self, endpoint: Option<&Request>) {
        self.forward(SessionEvent::PingTimeout(endpoint.cloned()));
    }

    fn on_send_result(&self, success: bool, error: Option<ErrorKind>, payload: &Payload) {
        self.forward(SessionEvent::SendResult {
            success,
            error,
            payload: payload.clone(),
        });
    }

    fn on_text_message(&self, text: &str) {
        self.forward(SessionEvent::TextMessage(text.to_owned()));
    }

    fn on_binary_message(&self, data: &Bytes) {
        self.forward(SessionEvent::BinaryMessage(data.clone()));
    }

    fn on_viability_changed(&self) {
        self.forward(SessionEvent::ViabilityChanged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct OnlyConnects {
        seen: Mutex<Vec<String>>,
    }

    impl SessionDelegate for OnlyConnects {
        fn on_connected(&self, endpoint: Option<&Request>) {
            self.seen
                .lock()
                .push(endpoint.map(|r| r.url().to_owned()).unwrap_or_default());
        }
    }

    #[test]
    fn test_default_methods_are_noops() {
        let delegate = OnlyConnects::default();
        SessionEvent::ViabilityChanged.notify(&delegate);
        SessionEvent::TextMessage("hi".into()).notify(&delegate);
        SessionEvent::Connected(Some(Request::new("ws://a"))).notify(&delegate);
        assert_eq!(*delegate.seen.lock(), vec!["ws://a".to_string()]);
    }

    #[test]
    fn test_channel_delegate_roundtrip() {
        let (delegate, mut rx) = ChannelDelegate::channel();
        let events = vec![
            SessionEvent::Connected(None),
            SessionEvent::ConnectError {
                kind: ErrorKind::DidCancel,
                cause: Some(Error::Cancelled),
            },
            SessionEvent::send_failed(ErrorKind::SocketAbsent, Payload::Text("x".into())),
            SessionEvent::BinaryMessage(Bytes::from_static(b"\x01")),
        ];
        for event in &events {
            event.notify(delegate.as_ref());
        }
        for expected in events {
            assert_eq!(rx.try_recv().unwrap(), expected);
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_delegate_ignores_closed_receiver() {
        let (delegate, rx) = ChannelDelegate::channel();
        drop(rx);
        delegate.on_viability_changed();
    }

    #[test]
    fn test_payload_len() {
        assert_eq!(Payload::Text("abc".into()).len(), 3);
        assert!(Payload::Binary(Bytes::new()).is_empty());
    }
}
