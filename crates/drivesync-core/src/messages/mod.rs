//! Queue message decoding
//!
//! Turns raw broker bodies into typed [`Command`](crate::domain::Command)s.
//!
//! ## Components
//!
//! - [`Envelope`] - The `{"event_type": ..., "payload": ...}` wire wrapper
//! - [`decode`] / [`decode_envelope`] - Table-driven decoding into one command variant
//! - [`encode`] - The inverse of decoding, used by producers and tests
//! - [`s3_event`] - Normalization of S3 event notifications into sync batches
//!
//! ## Wire format
//!
//! ```json
//! {"event_type": "file_sync",
//!  "payload": {"owner_id": 123, "bucket": "b", "key": "k", "destination": "/d"}}
//! ```

pub mod decoder;
pub mod s3_event;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use decoder::{decode, decode_envelope, encode, encode_to_vec};

/// Event type of OneDrive authorization messages
pub const AUTHORIZATION_EVENT: &str = "onedrive_authorization";

/// Event type of single-file sync messages
pub const FILE_SYNC_EVENT: &str = "file_sync";

/// Event type assigned to S3 event notifications
pub const S3_EVENT: &str = "s3_event";

/// Errors produced while decoding a queue message
///
/// Decode errors are never retried: the same bytes always fail the same way.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The body is not a JSON envelope
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// No decoder is registered for this event type
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// The payload does not match the schema of its event type
    #[error("failed to decode {schema} payload: {reason}")]
    Schema {
        /// Name of the expected schema
        schema: &'static str,
        /// Parser diagnostic
        reason: String,
    },
}

/// Body S3 publishes once when a bucket notification is configured
pub const S3_TEST_EVENT: &str = "s3:TestEvent";

/// Outer wrapper of one unit of queued work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Creates an envelope from an event type and payload
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Parses a raw broker body into an envelope
    ///
    /// Bodies that carry no `event_type` but have a top-level `Records`
    /// array are S3 event notifications; they are wrapped as [`S3_EVENT`]
    /// envelopes so they go through the same decoder table. The
    /// [`S3_TEST_EVENT`] body is wrapped the same way and decodes into an
    /// empty batch.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::MalformedEnvelope` if the body is not a JSON
    /// object of either shape.
    pub fn from_body(body: &[u8]) -> Result<Self, DecodeError> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| DecodeError::MalformedEnvelope(e.to_string()))?;

        let object = value
            .as_object()
            .ok_or_else(|| DecodeError::MalformedEnvelope("body is not a JSON object".into()))?;

        if object.contains_key("event_type") {
            return serde_json::from_value(value)
                .map_err(|e| DecodeError::MalformedEnvelope(e.to_string()));
        }

        let is_test_event =
            object.get("Event").and_then(serde_json::Value::as_str) == Some(S3_TEST_EVENT);
        if object.contains_key("Records") || is_test_event {
            return Ok(Self::new(S3_EVENT, value));
        }

        Err(DecodeError::MalformedEnvelope(
            "missing field `event_type`".into(),
        ))
    }
}
