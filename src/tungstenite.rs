//! [`Transport`] implementation over `tokio-tungstenite`.
//!
//! Each transport runs one I/O task per connection attempt. The task owns
//! the WebSocket stream, reports everything it sees through the
//! [`EventSink`], and takes outgoing frames from an unbounded command queue,
//! so no [`Transport`] method ever blocks or emits synchronously.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message, Utf8Bytes};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::request::Request;
use crate::transport::{EventSink, SendCompletion, Transport, TransportEvent, TransportFactory};

/// Close code reported when the stream ends without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

// Link phases. `CLOSED` is stored before the terminal event is emitted.
const HANDSHAKING: u8 = 0;
const OPEN: u8 = 1;
const CLOSED: u8 = 2;

/// Default bound on the opening handshake, TCP and TLS included.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default wait for the peer's reply to a close frame.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
struct Timeouts {
    handshake: Duration,
    close: Duration,
}

/// Creates [`TungsteniteTransport`]s on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TungsteniteFactory {
    runtime: Option<Handle>,
    timeouts: Timeouts,
}

impl Default for TungsteniteFactory {
    fn default() -> Self {
        Self {
            runtime: None,
            timeouts: Timeouts {
                handshake: DEFAULT_HANDSHAKE_TIMEOUT,
                close: DEFAULT_CLOSE_TIMEOUT,
            },
        }
    }
}

impl TungsteniteFactory {
    /// Spawn I/O tasks on the runtime current when a connection is opened.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn I/O tasks on `runtime`, so connections can be opened from
    /// threads outside any runtime.
    #[must_use]
    pub fn with_handle(runtime: Handle) -> Self {
        Self {
            runtime: Some(runtime),
            ..Self::default()
        }
    }

    /// Bound the opening handshake and the wait for a close reply.
    ///
    /// A handshake that outlives `handshake` is reported as
    /// [`TransportEvent::Error`]. A graceful close whose reply does not
    /// arrive within `close` drops the connection.
    #[must_use]
    pub fn with_timeouts(mut self, handshake: Duration, close: Duration) -> Self {
        self.timeouts = Timeouts { handshake, close };
        self
    }

    fn build(&self, request: &Request, events: EventSink) -> TungsteniteTransport {
        TungsteniteTransport {
            request: request.clone(),
            events,
            runtime: self.runtime.clone(),
            timeouts: self.timeouts,
            link: Mutex::new(None),
        }
    }
}

impl TransportFactory for TungsteniteFactory {
    fn create(&self, request: &Request, events: EventSink) -> Box<dyn Transport> {
        Box::new(self.build(request, events))
    }
}

enum Command {
    Text(String, SendCompletion),
    Binary(Bytes, SendCompletion),
    Ping(Bytes),
    Close,
}

struct Link {
    commands: mpsc::UnboundedSender<Command>,
    phase: Arc<AtomicU8>,
    task: JoinHandle<()>,
}

impl Link {
    fn phase(&self) -> u8 {
        if self.task.is_finished() {
            CLOSED
        } else {
            self.phase.load(Ordering::Acquire)
        }
    }
}

/// A WebSocket connection driven by `tokio-tungstenite`.
pub struct TungsteniteTransport {
    request: Request,
    events: EventSink,
    runtime: Option<Handle>,
    timeouts: Timeouts,
    link: Mutex<Option<Link>>,
}

impl TungsteniteTransport {
    fn runtime(&self) -> Result<Handle> {
        match &self.runtime {
            Some(runtime) => Ok(runtime.clone()),
            None => Ok(Handle::try_current()?),
        }
    }

    /// Run `f` off the caller's stack.
    fn defer(&self, f: impl FnOnce() + Send + 'static) {
        match self.runtime() {
            Ok(runtime) => {
                runtime.spawn(async move { f() });
            }
            Err(_) => {
                std::thread::spawn(f);
            }
        }
    }

    fn queue(&self, command: Command) {
        let rejected = match self.link.lock().as_ref() {
            Some(link) => link.commands.send(command).err().map(|e| e.0),
            None => Some(command),
        };
        let Some(command) = rejected else {
            return;
        };
        match command {
            Command::Text(_, completion) | Command::Binary(_, completion) => {
                let err = Error::Transport("connection is not open".into());
                self.defer(move || completion(Err(err)));
            }
            Command::Ping(_) | Command::Close => {
                trace!(
                    connection_id = self.events.connection_id(),
                    "control frame dropped, connection is not open"
                );
            }
        }
    }

    fn spawn(&self) -> Option<Link> {
        let runtime = match self.runtime() {
            Ok(runtime) => runtime,
            Err(e) => {
                let events = self.events.clone();
                self.defer(move || {
                    events.emit(TransportEvent::Error(e));
                });
                return None;
            }
        };

        let (commands, rx) = mpsc::unbounded_channel();
        let phase = Arc::new(AtomicU8::new(HANDSHAKING));
        let task = runtime.spawn(run(
            self.request.clone(),
            self.events.clone(),
            rx,
            phase.clone(),
            self.timeouts,
        ));
        Some(Link {
            commands,
            phase,
            task,
        })
    }
}

impl Transport for TungsteniteTransport {
    fn connect(&self) {
        let mut link = self.link.lock();
        match link.as_ref().map(Link::phase) {
            Some(HANDSHAKING) => return,
            Some(OPEN) => {
                // Already open: report it again so the session settles.
                let events = self.events.clone();
                self.defer(move || {
                    events.emit(TransportEvent::Connected(Vec::new()));
                });
                return;
            }
            _ => {}
        }
        if let Some(stale) = link.take() {
            stale.task.abort();
        }
        *link = self.spawn();
    }

    fn disconnect(&self, graceful: bool) {
        let Some(link) = self.link.lock().take() else {
            return;
        };
        if graceful && link.phase() == OPEN {
            // The task finishes the close handshake on its own.
            let _ = link.commands.send(Command::Close);
        } else {
            link.task.abort();
        }
    }

    fn send_text(&self, text: String, completion: SendCompletion) {
        self.queue(Command::Text(text, completion));
    }

    fn send_binary(&self, data: Bytes, completion: SendCompletion) {
        self.queue(Command::Binary(data, completion));
    }

    fn send_ping(&self, payload: Bytes) {
        self.queue(Command::Ping(payload));
    }
}

impl Drop for TungsteniteTransport {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            link.task.abort();
        }
    }
}

impl std::fmt::Debug for TungsteniteTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TungsteniteTransport")
            .field("url", &self.request.url())
            .field("connection_id", &self.events.connection_id())
            .finish_non_exhaustive()
    }
}

fn build_request(
    request: &Request,
) -> Result<tungstenite::handshake::client::Request> {
    let url = request.validate()?;
    let mut client_request = url
        .as_str()
        .into_client_request()
        .map_err(|e| Error::InvalidRequest(e.to_string()))?;
    for (name, value) in request.headers() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidRequest(format!("header {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidRequest(format!("header {name}: {e}")))?;
        client_request.headers_mut().append(name, value);
    }
    Ok(client_request)
}

async fn run(
    request: Request,
    events: EventSink,
    mut commands: mpsc::UnboundedReceiver<Command>,
    phase: Arc<AtomicU8>,
    timeouts: Timeouts,
) {
    let connection_id = events.connection_id();
    let finish = |event: TransportEvent| {
        phase.store(CLOSED, Ordering::Release);
        events.emit(event);
    };
    let client_request = match build_request(&request) {
        Ok(client_request) => client_request,
        Err(e) => {
            finish(TransportEvent::Error(e));
            return;
        }
    };

    debug!(connection_id, url = request.url(), "opening websocket");
    let handshake = tokio::time::timeout(
        timeouts.handshake,
        tokio_tungstenite::connect_async(client_request),
    );
    let (mut ws, response) = match handshake.await {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => {
            finish(TransportEvent::Error(Error::Transport(e.to_string())));
            return;
        }
        Err(_) => {
            finish(TransportEvent::Error(Error::Transport(format!(
                "handshake timed out after {:?}",
                timeouts.handshake
            ))));
            return;
        }
    };

    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                value.to_str().unwrap_or_default().to_owned(),
            )
        })
        .collect();
    phase.store(OPEN, Ordering::Release);
    events.emit(TransportEvent::Connected(headers));

    let mut closing = false;
    // Armed when the close frame goes out.
    let close_deadline = tokio::time::sleep(timeouts.close);
    tokio::pin!(close_deadline);
    loop {
        tokio::select! {
            command = commands.recv(), if !closing => {
                let Some(command) = command else {
                    // Transport dropped without a close.
                    break;
                };
                let (message, completion) = match command {
                    Command::Text(text, completion) => (Message::text(text), Some(completion)),
                    Command::Binary(data, completion) => (Message::binary(data), Some(completion)),
                    Command::Ping(payload) => (Message::Ping(payload), None),
                    Command::Close => {
                        closing = true;
                        close_deadline.as_mut().reset(Instant::now() + timeouts.close);
                        (
                            Message::Close(Some(CloseFrame {
                                code: CloseCode::Normal,
                                reason: Utf8Bytes::from_static(""),
                            })),
                            None,
                        )
                    }
                };
                let result = ws
                    .send(message)
                    .await
                    .map_err(|e| Error::Transport(e.to_string()));
                let failed = result.as_ref().err().cloned();
                if let Some(completion) = completion {
                    completion(result);
                }
                if let Some(e) = failed {
                    finish(TransportEvent::Error(e));
                    break;
                }
            }
            () = &mut close_deadline, if closing => {
                debug!(connection_id, timeout = ?timeouts.close, "close reply overdue, dropping connection");
                break;
            }
            incoming = ws.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        events.emit(TransportEvent::Text(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        events.emit(TransportEvent::Binary(data));
                    }
                    Some(Ok(Message::Ping(data))) => {
                        events.emit(TransportEvent::Ping(data));
                    }
                    Some(Ok(Message::Pong(data))) => {
                        events.emit(TransportEvent::Pong(data));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                            .unwrap_or((ABNORMAL_CLOSURE, String::new()));
                        finish(TransportEvent::Disconnected { reason, code });
                        break;
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        finish(TransportEvent::Error(Error::Transport(e.to_string())));
                        break;
                    }
                    None => {
                        finish(TransportEvent::Disconnected {
                            reason: "stream ended".into(),
                            code: ABNORMAL_CLOSURE,
                        });
                        break;
                    }
                }
            }
        }
    }
    phase.store(CLOSED, Ordering::Release);
    debug!(connection_id, "websocket task finished");
}
