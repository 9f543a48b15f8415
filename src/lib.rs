//! # rsws-session - Client-side WebSocket session management
//!
//! `rsws-session` sits on top of a WebSocket transport and owns everything
//! between "I want to talk to this endpoint" and individual frames.
//!
//! ## Features
//!
//! - **Session state machine** with reuse of the live transport for repeated
//!   connects to the same endpoint, and full teardown on `force` or a new one
//! - **Heartbeat supervision**: periodic pings with pong-timeout detection
//! - **Serialized state**: transport events, heartbeat ticks and caller
//!   commands never race on connection state
//! - **Message routing** to a lifecycle delegate and best-effort JSON object
//!   decoding for a structured consumer
//! - **Pluggable transports** through [`Transport`] / [`TransportFactory`], with
//!   a `tokio-tungstenite` implementation behind the `tungstenite` feature
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rsws_session::{ChannelDelegate, Request, Session, SessionConfig, TungsteniteFactory};
//!
//! let session = Session::new(SessionConfig::default(), TungsteniteFactory::new())?;
//! let (delegate, mut events) = ChannelDelegate::channel();
//! session.set_delegate(&delegate);
//! session.connect(Some(Request::new("ws://127.0.0.1:9001")), false)?;
//! ```

pub mod config;
pub mod delegate;
pub mod dispatch;
pub mod error;
mod heartbeat;
pub mod request;
pub mod session;
pub mod timer;
pub mod transport;

#[cfg(feature = "tungstenite")]
pub mod tungstenite;

pub use config::SessionConfig;
pub use delegate::{ChannelDelegate, ObjectConsumer, Payload, SessionDelegate, SessionEvent};
pub use dispatch::{DispatchOutcome, JsonObject};
pub use error::{Error, ErrorKind, Result};
pub use request::Request;
pub use session::{Session, SessionSnapshot, SessionState};
pub use timer::RepeatingTimer;
pub use transport::{EventSink, SendCompletion, Transport, TransportEvent, TransportFactory};

#[cfg(feature = "tungstenite")]
pub use tungstenite::{TungsteniteFactory, TungsteniteTransport};
