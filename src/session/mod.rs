//! Session state machine, event bridge and heartbeat supervision.
//!
//! ## Lifecycle
//!
//! 1. **Disconnected** - initial state; no transport owned, or the owned
//!    transport failed
//! 2. **Connecting** - `connect` issued the transport's `connect()`
//! 3. **Connected** - transport reported the handshake done; heartbeat running
//! 4. **Disconnecting** - transient, inside `disconnect`
//!
//! Transport errors, cancellation and `disconnected` events move the session
//! straight back to `Disconnected` and keep the transport for a later reuse.
//! Loss of viability also releases the transport.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rsws_session::{ChannelDelegate, Request, Session, SessionConfig, SessionEvent};
//!
//! let session = Session::new(SessionConfig::default(), factory)?;
//! let (delegate, mut events) = ChannelDelegate::channel();
//! session.set_delegate(&delegate);
//!
//! session.connect(Some(Request::new("ws://example.com/ws")), false)?;
//! while let Some(event) = events.recv().await {
//!     if let SessionEvent::Connected(_) = event {
//!         session.send_text("hello")?;
//!     }
//! }
//! ```

pub(crate) mod bridge;
#[allow(clippy::module_inception)]
mod session;
mod state;

pub use session::{Session, SessionSnapshot};
pub use state::SessionState;

pub(crate) use session::Shared;
