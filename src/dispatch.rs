//! Structured decoding of inbound messages.
//!
//! Raw text and binary payloads always reach the lifecycle consumer first.
//! Decoding is best effort: failures are logged here and never surface to
//! the caller or touch connection state.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::delegate::ObjectConsumer;

/// A decoded key-value object.
pub type JsonObject = Map<String, Value>;

/// What happened to a payload handed to [`route`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Decoded to an object and delivered to the consumer.
    Delivered,
    /// Valid JSON, but not an object. Nothing delivered.
    NotAnObject,
    /// Not valid JSON. Nothing delivered.
    Malformed,
}

/// Decode `bytes` as a JSON document.
///
/// Returns `Ok(None)` for well-formed documents whose top level is not an
/// object (scalars and arrays are accepted by the parser but not forwarded).
///
/// # Errors
///
/// Returns the parser error if `bytes` is not valid JSON.
pub fn decode_object(bytes: &[u8]) -> Result<Option<JsonObject>, serde_json::Error> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(object) => Ok(Some(object)),
        _ => Ok(None),
    }
}

/// Decode `bytes` and hand the object to `consumer`.
pub fn route(bytes: &[u8], consumer: &dyn ObjectConsumer) -> DispatchOutcome {
    match decode_object(bytes) {
        Ok(Some(object)) => {
            consumer.on_decoded_object(object);
            DispatchOutcome::Delivered
        }
        Ok(None) => {
            debug!(len = bytes.len(), "inbound message is not a JSON object");
            DispatchOutcome::NotAnObject
        }
        Err(e) => {
            warn!(len = bytes.len(), error = %e, "failed to decode inbound message");
            DispatchOutcome::Malformed
        }
    }
}
