//! Test harness utilities for session behaviour tests.
//!
//! Provides a scripted in-memory transport, a recording consumer pair, and an
//! axum echo server for end-to-end runs over real sockets.

#![allow(dead_code)]

mod recorder;
mod server;
mod transport;

pub use recorder::{Recorder, count};
pub use server::TestServer;
pub use transport::{Call, MockFactory, MockTransport};

use rsws_session::{Request, Session, SessionConfig};

pub const ENDPOINT_A: &str = "ws://a.example/socket";
pub const ENDPOINT_B: &str = "ws://b.example/socket";

/// A session on the current runtime with a mock factory and a recorder attached.
pub fn session_with(config: SessionConfig) -> (Session, MockFactory, Recorder) {
    let factory = MockFactory::default();
    let session = Session::new(config, factory.clone()).unwrap();
    let recorder = Recorder::attach(&session);
    (session, factory, recorder)
}

pub fn session() -> (Session, MockFactory, Recorder) {
    session_with(SessionConfig::default())
}

pub fn request(url: &str) -> Option<Request> {
    Some(Request::new(url))
}
