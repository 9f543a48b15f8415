//! Event bridge: applies transport events to session state.
//!
//! Every event is applied under the session lock, and the notifications it
//! produces are queued before that lock is released. Events from a transport
//! the session no longer owns are dropped before they can touch anything.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::delegate::SessionEvent;
use crate::error::{Error, ErrorKind};
use crate::session::SessionState;
use crate::session::session::{Inner, Shared};
use crate::transport::TransportEvent;

pub(crate) fn apply(shared: &Arc<Shared>, connection_id: u64, event: TransportEvent) {
    let mut events = Vec::new();
    {
        let mut inner = shared.inner.lock();
        if !inner.owns(connection_id) {
            debug!(
                connection_id,
                event = event.name(),
                "event from released transport ignored"
            );
            return;
        }

        match event {
            TransportEvent::Connected(headers) => {
                inner.state = SessionState::Connected;
                shared.start_heartbeat(&mut inner);
                info!(connection_id, headers = headers.len(), "connected");
                events.push(SessionEvent::Connected(inner.endpoint.clone()));
            }
            TransportEvent::Disconnected { reason, code } => {
                mark_disconnected(&mut inner);
                info!(connection_id, code, %reason, "disconnected");
                events.push(SessionEvent::Disconnected(inner.endpoint.clone()));
            }
            TransportEvent::Text(text) => {
                debug!(connection_id, len = text.len(), "text received");
                events.push(SessionEvent::TextMessage(text));
            }
            TransportEvent::Binary(data) => {
                debug!(connection_id, len = data.len(), "binary received");
                events.push(SessionEvent::BinaryMessage(data));
            }
            TransportEvent::ViabilityChanged(available) => {
                if !available {
                    // The path is gone; keep nothing that could be sent on.
                    inner.teardown(true);
                    events.push(SessionEvent::ViabilityChanged);
                }
                debug!(connection_id, available, "viability changed");
            }
            TransportEvent::ReconnectSuggested(suggested) => {
                shared.start_heartbeat(&mut inner);
                debug!(connection_id, suggested, "reconnect suggested");
            }
            TransportEvent::Ping(_) => {
                debug!(
                    connection_id,
                    last_ping = ?inner.heartbeat.last_ping(),
                    "ping received"
                );
            }
            TransportEvent::Pong(_) => {
                inner.heartbeat.pong_received();
                debug!(connection_id, "pong received");
            }
            TransportEvent::Error(cause) => {
                mark_disconnected(&mut inner);
                warn!(connection_id, error = %cause, "transport error");
                events.push(SessionEvent::ConnectError {
                    kind: ErrorKind::Disconnected,
                    cause: Some(cause),
                });
            }
            TransportEvent::Cancelled => {
                mark_disconnected(&mut inner);
                warn!(connection_id, "transport cancelled");
                events.push(SessionEvent::ConnectError {
                    kind: ErrorKind::DidCancel,
                    cause: Some(Error::Cancelled),
                });
            }
        }
        shared.post(events);
    }
    shared.flush();
}

/// Leave `Connected` (or `Connecting`) without releasing the transport.
fn mark_disconnected(inner: &mut Inner) {
    inner.heartbeat.stop();
    inner.state = SessionState::Disconnected;
}
