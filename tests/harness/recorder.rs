//! Recording consumers.

use std::sync::Arc;

use parking_lot::Mutex;
use rsws_session::{
    ChannelDelegate, JsonObject, ObjectConsumer, Session, SessionEvent,
};
use tokio::sync::mpsc;

/// Collects structured objects routed to it.
#[derive(Default)]
pub struct Objects {
    seen: Mutex<Vec<JsonObject>>,
}

impl ObjectConsumer for Objects {
    fn on_decoded_object(&self, object: JsonObject) {
        self.seen.lock().push(object);
    }
}

/// Lifecycle events and decoded objects seen by one session.
pub struct Recorder {
    pub delegate: Arc<ChannelDelegate>,
    pub objects: Arc<Objects>,
    rx: Mutex<mpsc::UnboundedReceiver<SessionEvent>>,
    seen: Mutex<Vec<SessionEvent>>,
}

impl Recorder {
    pub fn attach(session: &Session) -> Self {
        let (delegate, rx) = ChannelDelegate::channel();
        let objects = Arc::new(Objects::default());
        session.set_delegate(&delegate);
        session.set_object_consumer(&objects);
        Self {
            delegate,
            objects,
            rx: Mutex::new(rx),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Everything delivered so far, in order.
    pub fn events(&self) -> Vec<SessionEvent> {
        let mut rx = self.rx.lock();
        let mut seen = self.seen.lock();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        seen.clone()
    }

    /// Forget everything delivered so far.
    pub fn clear(&self) {
        self.events();
        self.seen.lock().clear();
        self.objects.seen.lock().clear();
    }

    pub fn objects(&self) -> Vec<JsonObject> {
        self.objects.seen.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&SessionEvent) -> bool) -> usize {
        count(&self.events(), pred)
    }
}

pub fn count(events: &[SessionEvent], pred: impl Fn(&SessionEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}
