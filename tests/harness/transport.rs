//! Scripted transport for driving a session by hand.
//!
//! Every call the session makes is recorded. Events are pushed from the test
//! with [`MockTransport::emit`] and send completions are held until the test
//! resolves them, so nothing ever runs inside a session call.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use rsws_session::{
    EventSink, Request, Result, SendCompletion, Transport, TransportEvent, TransportFactory,
};

/// One call made by the session on a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    Disconnect { graceful: bool },
    ForceDisconnect,
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
}

/// Shared view of one created transport.
pub struct MockTransport {
    pub request: Request,
    sink: EventSink,
    calls: Mutex<Vec<Call>>,
    completions: Mutex<Vec<SendCompletion>>,
}

impl MockTransport {
    pub fn connection_id(&self) -> u64 {
        self.sink.connection_id()
    }

    /// Push an event into the session, as the I/O side would.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.sink.emit(event)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn pings(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::Ping(_)))
            .count()
    }

    pub fn pending_sends(&self) -> usize {
        self.completions.lock().len()
    }

    /// Run every held send completion with `result`.
    pub fn complete_sends(&self, result: Result<()>) {
        let completions = std::mem::take(&mut *self.completions.lock());
        for completion in completions {
            completion(result.clone());
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

struct Handle(Arc<MockTransport>);

impl Transport for Handle {
    fn connect(&self) {
        self.0.record(Call::Connect);
    }

    fn disconnect(&self, graceful: bool) {
        self.0.record(Call::Disconnect { graceful });
    }

    fn force_disconnect(&self) {
        self.0.record(Call::ForceDisconnect);
    }

    fn send_text(&self, text: String, completion: SendCompletion) {
        self.0.record(Call::Text(text));
        self.0.completions.lock().push(completion);
    }

    fn send_binary(&self, data: Bytes, completion: SendCompletion) {
        self.0.record(Call::Binary(data));
        self.0.completions.lock().push(completion);
    }

    fn send_ping(&self, payload: Bytes) {
        self.0.record(Call::Ping(payload));
    }
}

/// Factory keeping a handle to every transport it creates.
#[derive(Clone, Default)]
pub struct MockFactory {
    created: Arc<Mutex<Vec<Arc<MockTransport>>>>,
}

impl MockFactory {
    pub fn created(&self) -> usize {
        self.created.lock().len()
    }

    pub fn transport(&self, index: usize) -> Arc<MockTransport> {
        self.created.lock()[index].clone()
    }

    pub fn last(&self) -> Arc<MockTransport> {
        self.created
            .lock()
            .last()
            .cloned()
            .expect("no transport created yet")
    }

    pub fn try_last(&self) -> Option<Arc<MockTransport>> {
        self.created.lock().last().cloned()
    }
}

impl TransportFactory for MockFactory {
    fn create(&self, request: &Request, events: EventSink) -> Box<dyn Transport> {
        let transport = Arc::new(MockTransport {
            request: request.clone(),
            sink: events,
            calls: Mutex::new(Vec::new()),
            completions: Mutex::new(Vec::new()),
        });
        self.created.lock().push(transport.clone());
        Box::new(Handle(transport))
    }
}
