//! Interactive session client.
//!
//! Connects to a WebSocket endpoint, sends every line typed on stdin and logs
//! each session notification. `/quit` disconnects and exits.
//!
//! Run the echo server from the test suite or any public echo endpoint, then:
//!   RUST_LOG=rsws_session=debug cargo run --example session_client -- ws://127.0.0.1:9001/echo

use std::error::Error;
use std::sync::Arc;

use rsws_session::{
    ChannelDelegate, JsonObject, ObjectConsumer, Request, Session, SessionConfig, SessionEvent,
    TungsteniteFactory,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "ws://127.0.0.1:9001/echo";

struct LogObjects;

impl ObjectConsumer for LogObjects {
    fn on_decoded_object(&self, object: JsonObject) {
        info!(?object, "object received");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_URL.to_string());

    let session = Session::new(SessionConfig::default(), TungsteniteFactory::new())?;
    let (delegate, mut events) = ChannelDelegate::channel();
    let objects = Arc::new(LogObjects);
    session.set_delegate(&delegate);
    session.set_object_consumer(&objects);

    info!(%url, "connecting");
    session.connect(Some(Request::new(url)), false)?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::TextMessage(text) => info!(%text, "text received"),
                SessionEvent::BinaryMessage(data) => info!(len = data.len(), "binary received"),
                SessionEvent::SendResult {
                    success, payload, ..
                } if success => info!(len = payload.len(), "sent"),
                other => info!(event = ?other, "session event"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim() == "/quit" {
            break;
        }
        if let Err(e) = session.send_text(line) {
            info!(error = %e, "send rejected");
        }
    }

    session.disconnect(true);
    info!(endpoint = ?session.endpoint().map(|r| r.url().to_owned()), "disconnected");
    Ok(())
}
