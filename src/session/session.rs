use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::{SessionConfig, check_positive};
use crate::delegate::{ObjectConsumer, Payload, SessionDelegate, SessionEvent};
use crate::dispatch;
use crate::error::{Error, ErrorKind, Result};
use crate::heartbeat::{Heartbeat, PingCheck};
use crate::request::Request;
use crate::session::SessionState;
use crate::transport::{EventSink, SendCompletion, Transport, TransportFactory};

/// Client-side WebSocket session.
///
/// A `Session` owns at most one [`Transport`] at a time and keeps a single
/// consistent view of its connection state. Transport events, heartbeat
/// ticks and caller commands are serialized on one internal lock; consumer
/// notifications are delivered after that lock is released.
///
/// Notifications reach consumers one at a time, in the order the state
/// changes that produced them were applied. Whichever thread finds the
/// outbox idle delivers everything queued, including notifications queued by
/// other threads meanwhile.
///
/// Cloning a `Session` yields another handle to the same session.
///
/// ## Example
///
/// ```rust,ignore
/// use rsws_session::{Request, Session, SessionConfig, TungsteniteFactory};
///
/// let session = Session::new(SessionConfig::default(), TungsteniteFactory::new())?;
/// session.set_delegate(&delegate);
/// session.connect(Some(Request::new("ws://127.0.0.1:9001")), false)?;
/// session.send_text("hello")?;
/// session.disconnect(false);
/// ```
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

/// Point-in-time view of a session, read under a single lock acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Connection state.
    pub state: SessionState,
    /// Current endpoint.
    pub endpoint: Option<Request>,
    /// Identifier of the owned transport instance.
    pub connection_id: Option<u64>,
    /// Whether a heartbeat timer is alive.
    pub heartbeat_running: bool,
    /// When the outstanding ping window started.
    pub last_ping: Option<Instant>,
}

pub(crate) struct Shared {
    pub(crate) inner: Mutex<Inner>,
    outbox: Mutex<Outbox>,
    delegates: RwLock<Delegates>,
    factory: Box<dyn TransportFactory>,
    runtime: Handle,
}

pub(crate) struct Inner {
    pub(crate) state: SessionState,
    pub(crate) endpoint: Option<Request>,
    pub(crate) connection: Option<Connection>,
    pub(crate) heartbeat: Heartbeat,
    pub(crate) config: SessionConfig,
    next_connection_id: u64,
}

pub(crate) struct Connection {
    pub(crate) id: u64,
    transport: Box<dyn Transport>,
}

#[derive(Default)]
struct Outbox {
    pending: VecDeque<SessionEvent>,
    draining: bool,
}

/// Clears `draining` if a consumer callback unwinds.
struct DrainGuard<'a> {
    outbox: &'a Mutex<Outbox>,
    armed: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.outbox.lock().draining = false;
        }
    }
}

#[derive(Default)]
struct Delegates {
    lifecycle: Option<Weak<dyn SessionDelegate>>,
    objects: Option<Weak<dyn ObjectConsumer>>,
}

impl Inner {
    pub(crate) fn owns(&self, connection_id: u64) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|conn| conn.id == connection_id)
    }

    /// Stop the heartbeat and release the owned transport.
    ///
    /// State is `Disconnected` on return whatever the transport does next.
    pub(crate) fn teardown(&mut self, force: bool) {
        self.heartbeat.stop();
        self.state = SessionState::Disconnecting;
        if let Some(conn) = self.connection.take() {
            if force {
                conn.transport.force_disconnect();
            } else {
                conn.transport.disconnect(true);
            }
            debug!(connection_id = conn.id, force, "transport released");
        }
        self.state = SessionState::Disconnected;
    }
}

impl Shared {
    /// (Re)start the heartbeat if the session is connected.
    pub(crate) fn start_heartbeat(self: &Arc<Self>, inner: &mut Inner) {
        if !inner.state.can_ping() || inner.connection.is_none() {
            return;
        }
        let session = Arc::downgrade(self);
        let period = inner.config.heartbeat_interval;
        inner
            .heartbeat
            .start(&self.runtime, period, move |generation| {
                move || match session.upgrade() {
                    Some(shared) => shared.heartbeat_tick(generation),
                    None => ControlFlow::Break(()),
                }
            });
        debug!(?period, "heartbeat started");
    }

    fn heartbeat_tick(&self, generation: u64) -> ControlFlow<()> {
        {
            let mut inner = self.inner.lock();
            if !inner.heartbeat.is_current(generation) {
                return ControlFlow::Break(());
            }

            if inner.state.can_ping() {
                if let Some(conn) = &inner.connection {
                    conn.transport.send_ping(inner.config.ping_payload.clone());
                }
            }

            let timeout = inner.config.ping_timeout;
            match inner.heartbeat.check(Instant::now(), timeout) {
                PingCheck::Armed => trace!("ping window armed"),
                PingCheck::Pending(elapsed) => trace!(?elapsed, "ping outstanding"),
                PingCheck::TimedOut(elapsed) => {
                    let err = Error::PingTimeout { elapsed, timeout };
                    warn!(endpoint = ?inner.endpoint.as_ref().map(Request::url), "{err}");
                    self.post(vec![SessionEvent::PingTimeout(inner.endpoint.clone())]);
                }
            }
        }
        self.flush();
        ControlFlow::Continue(())
    }

    /// Queue notifications behind everything already queued.
    ///
    /// Callers that derived `events` from session state post while still
    /// holding `inner`, so queue order follows state order.
    pub(crate) fn post(&self, events: Vec<SessionEvent>) {
        if events.is_empty() {
            return;
        }
        self.outbox.lock().pending.extend(events);
    }

    /// Deliver queued notifications unless another thread already is.
    ///
    /// Must not be called with `inner` locked.
    pub(crate) fn flush(&self) {
        {
            let mut outbox = self.outbox.lock();
            if outbox.draining || outbox.pending.is_empty() {
                return;
            }
            outbox.draining = true;
        }
        let mut guard = DrainGuard {
            outbox: &self.outbox,
            armed: true,
        };
        loop {
            let event = {
                let mut outbox = self.outbox.lock();
                match outbox.pending.pop_front() {
                    Some(event) => event,
                    None => {
                        // Cleared under the same lock that saw the queue empty.
                        outbox.draining = false;
                        guard.armed = false;
                        return;
                    }
                }
            };
            self.notify(&event);
        }
    }

    fn notify(&self, event: &SessionEvent) {
        let (delegate, consumer) = {
            let delegates = self.delegates.read();
            (
                delegates.lifecycle.as_ref().and_then(Weak::upgrade),
                delegates.objects.as_ref().and_then(Weak::upgrade),
            )
        };

        if let Some(delegate) = &delegate {
            event.notify(delegate.as_ref());
        }
        if let Some(consumer) = &consumer {
            match event {
                SessionEvent::TextMessage(text) => {
                    dispatch::route(text.as_bytes(), consumer.as_ref());
                }
                SessionEvent::BinaryMessage(data) => {
                    dispatch::route(data, consumer.as_ref());
                }
                _ => {}
            }
        }
    }
}

impl Session {
    /// Create a session on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// - `Error::Runtime` if called outside a tokio runtime
    /// - `Error::InvalidConfig` if `config` fails validation
    pub fn new<F>(config: SessionConfig, factory: F) -> Result<Self>
    where
        F: TransportFactory + 'static,
    {
        let runtime = Handle::try_current()?;
        Self::with_handle(config, factory, runtime)
    }

    /// Create a session whose heartbeat runs on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if `config` fails validation.
    pub fn with_handle<F>(config: SessionConfig, factory: F, runtime: Handle) -> Result<Self>
    where
        F: TransportFactory + 'static,
    {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: SessionState::Disconnected,
                    endpoint: None,
                    connection: None,
                    heartbeat: Heartbeat::default(),
                    config,
                    next_connection_id: 1,
                }),
                outbox: Mutex::new(Outbox::default()),
                delegates: RwLock::new(Delegates::default()),
                factory: Box::new(factory),
                runtime,
            }),
        })
    }

    /// Create a session and immediately connect it to `request`.
    ///
    /// The connection is always fresh (`force = true`). Register delegates
    /// before the transport reports back to observe the `connected` event.
    ///
    /// # Errors
    ///
    /// Any error from [`Session::new`] or [`Session::connect`].
    pub fn connect_to<F>(config: SessionConfig, factory: F, request: Request) -> Result<Self>
    where
        F: TransportFactory + 'static,
    {
        let session = Self::new(config, factory)?;
        session.connect(Some(request), true)?;
        Ok(session)
    }

    /// Register the lifecycle consumer. Only a weak reference is kept.
    pub fn set_delegate<D>(&self, delegate: &Arc<D>)
    where
        D: SessionDelegate + 'static,
    {
        let weak = Arc::downgrade(delegate);
        self.shared.delegates.write().lifecycle = Some(weak as Weak<dyn SessionDelegate>);
    }

    /// Remove the lifecycle consumer.
    pub fn clear_delegate(&self) {
        self.shared.delegates.write().lifecycle = None;
    }

    /// Register the structured-message consumer. Only a weak reference is kept.
    pub fn set_object_consumer<C>(&self, consumer: &Arc<C>)
    where
        C: ObjectConsumer + 'static,
    {
        let weak = Arc::downgrade(consumer);
        self.shared.delegates.write().objects = Some(weak as Weak<dyn ObjectConsumer>);
    }

    /// Remove the structured-message consumer.
    pub fn clear_object_consumer(&self) {
        self.shared.delegates.write().objects = None;
    }

    /// Connect to `request`.
    ///
    /// Without `force`, a request for the endpoint the session already owns a
    /// transport for re-triggers that transport instead of replacing it.
    /// Otherwise any existing transport is force-disconnected and a new one
    /// is created. Returns once the transport call is issued; the outcome
    /// arrives as `on_connected` or `on_connect_error`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRequest` if `request` is absent or its URL is
    /// unusable. The session is left untouched and the lifecycle consumer
    /// receives `on_connect_error(RequestError, ..)`.
    pub fn connect(&self, request: Option<Request>, force: bool) -> Result<()> {
        let request = match request {
            Some(request) => request,
            None => return self.reject_request(Error::InvalidRequest("no request".into())),
        };
        if let Err(err) = request.validate() {
            return self.reject_request(err);
        }

        let shared = &self.shared;
        let mut inner = shared.inner.lock();
        let reuse = !force
            && inner.connection.is_some()
            && inner
                .endpoint
                .as_ref()
                .is_some_and(|current| current.same_endpoint(&request));

        if reuse {
            inner.heartbeat.stop();
            inner.state = SessionState::Connecting;
            if let Some(conn) = &inner.connection {
                debug!(connection_id = conn.id, url = request.url(), "reusing transport");
                conn.transport.connect();
            }
        } else {
            inner.teardown(true);
            let id = inner.next_connection_id;
            inner.next_connection_id += 1;
            let sink = EventSink::new(id, Arc::downgrade(shared));
            let transport = shared.factory.create(&request, sink);
            info!(connection_id = id, url = request.url(), "transport created");
            inner.state = SessionState::Connecting;
            transport.connect();
            inner.connection = Some(Connection { id, transport });
        }

        inner.endpoint = Some(request);
        Ok(())
    }

    fn reject_request(&self, err: Error) -> Result<()> {
        warn!(error = %err, "connect rejected");
        self.shared.post(vec![SessionEvent::ConnectError {
            kind: ErrorKind::RequestError,
            cause: Some(err.clone()),
        }]);
        self.shared.flush();
        Err(err)
    }

    /// Disconnect and release the transport.
    ///
    /// With `force` the transport is dropped without a close handshake.
    /// State is `Disconnected` when this returns. No `on_disconnected`
    /// notification follows: events from the released transport are ignored.
    pub fn disconnect(&self, force: bool) {
        let mut inner = self.shared.inner.lock();
        let had_connection = inner.connection.is_some();
        inner.teardown(force);
        if had_connection {
            info!(force, "disconnected by caller");
        }
    }

    /// Send a text message.
    ///
    /// # Errors
    ///
    /// - `Error::SocketAbsent` if no transport is owned
    /// - `Error::MessageEmpty` if `text` is empty
    ///
    /// Failures are also reported through `on_send_result`; success is
    /// reported there once the transport has written the message.
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(Payload::Text(text.into()))
    }

    /// Send a binary message.
    ///
    /// # Errors
    ///
    /// Returns `Error::SocketAbsent` if no transport is owned.
    pub fn send_binary(&self, data: impl Into<Bytes>) -> Result<()> {
        self.send(Payload::Binary(data.into()))
    }

    fn send(&self, payload: Payload) -> Result<()> {
        let inner = self.shared.inner.lock();
        let failure = match &inner.connection {
            None => Error::SocketAbsent,
            Some(_) if matches!(&payload, Payload::Text(text) if text.is_empty()) => {
                Error::MessageEmpty
            }
            Some(conn) => {
                let completion = completion_for(Arc::downgrade(&self.shared), payload.clone());
                trace!(connection_id = conn.id, len = payload.len(), "send");
                match payload {
                    Payload::Text(text) => conn.transport.send_text(text, completion),
                    Payload::Binary(data) => conn.transport.send_binary(data, completion),
                }
                return Ok(());
            }
        };
        debug!(error = %failure, "send rejected");
        self.shared
            .post(vec![SessionEvent::send_failed(failure.kind(), payload)]);
        drop(inner);
        self.shared.flush();
        Err(failure)
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.inner.lock().state
    }

    /// The endpoint of the last accepted `connect` call.
    #[must_use]
    pub fn endpoint(&self) -> Option<Request> {
        self.shared.inner.lock().endpoint.clone()
    }

    /// Whether a transport is currently owned.
    #[must_use]
    pub fn has_connection(&self) -> bool {
        self.shared.inner.lock().connection.is_some()
    }

    /// Whether a heartbeat timer is alive.
    #[must_use]
    pub fn is_heartbeat_running(&self) -> bool {
        self.shared.inner.lock().heartbeat.is_running()
    }

    /// Start of the outstanding ping window, `None` when nothing is outstanding.
    #[must_use]
    pub fn last_ping(&self) -> Option<Instant> {
        self.shared.inner.lock().heartbeat.last_ping()
    }

    /// Consistent view of all session fields.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.shared.inner.lock();
        SessionSnapshot {
            state: inner.state,
            endpoint: inner.endpoint.clone(),
            connection_id: inner.connection.as_ref().map(|conn| conn.id),
            heartbeat_running: inner.heartbeat.is_running(),
            last_ping: inner.heartbeat.last_ping(),
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> SessionConfig {
        self.shared.inner.lock().config.clone()
    }

    /// Configured heartbeat interval.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        self.shared.inner.lock().config.heartbeat_interval
    }

    /// Configured ping timeout.
    #[must_use]
    pub fn ping_timeout(&self) -> Duration {
        self.shared.inner.lock().config.ping_timeout
    }

    /// Period of the running heartbeat timer.
    #[must_use]
    pub fn active_heartbeat_interval(&self) -> Option<Duration> {
        self.shared.inner.lock().heartbeat.period()
    }

    /// Change the heartbeat interval. Takes effect at the next heartbeat start.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if `interval` is zero.
    pub fn set_heartbeat_interval(&self, interval: Duration) -> Result<()> {
        check_positive("heartbeat_interval", interval)?;
        self.shared.inner.lock().config.heartbeat_interval = interval;
        Ok(())
    }

    /// Change the ping timeout. Takes effect at the next heartbeat tick.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if `timeout` is zero.
    pub fn set_ping_timeout(&self, timeout: Duration) -> Result<()> {
        check_positive("ping_timeout", timeout)?;
        self.shared.inner.lock().config.ping_timeout = timeout;
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("Session")
            .field("state", &snapshot.state)
            .field("endpoint", &snapshot.endpoint.as_ref().map(Request::url))
            .field("connection_id", &snapshot.connection_id)
            .field("heartbeat_running", &snapshot.heartbeat_running)
            .finish()
    }
}

fn completion_for(session: Weak<Shared>, payload: Payload) -> SendCompletion {
    Box::new(move |result| {
        let Some(shared) = session.upgrade() else {
            return;
        };
        let event = match result {
            Ok(()) => SessionEvent::SendResult {
                success: true,
                error: None,
                payload,
            },
            Err(err) => {
                warn!(error = %err, len = payload.len(), "transport write failed");
                SessionEvent::send_failed(err.kind(), payload)
            }
        };
        shared.post(vec![event]);
        shared.flush();
    })
}
