//! Table-driven envelope decoding
//!
//! Each supported `event_type` has exactly one entry in [`DECODERS`]. An
//! event type without an entry is rejected, never routed to a default.

use serde_json::Value;

use super::{
    s3_event, DecodeError, Envelope, AUTHORIZATION_EVENT, FILE_SYNC_EVENT, S3_EVENT,
};
use crate::domain::{AuthorizationCommand, Command, SyncCommand};

/// Parses one payload into a command, returning a diagnostic on mismatch
type DecodeFn = fn(Value) -> Result<Command, String>;

struct DecoderEntry {
    event_type: &'static str,
    schema: &'static str,
    decode: DecodeFn,
}

const DECODERS: &[DecoderEntry] = &[
    DecoderEntry {
        event_type: AUTHORIZATION_EVENT,
        schema: "onedrive authorization",
        decode: decode_authorization,
    },
    DecoderEntry {
        event_type: FILE_SYNC_EVENT,
        schema: "file sync",
        decode: decode_file_sync,
    },
    DecoderEntry {
        event_type: S3_EVENT,
        schema: "s3 event notification",
        decode: s3_event::decode_notification,
    },
];

fn decode_authorization(payload: Value) -> Result<Command, String> {
    serde_json::from_value::<AuthorizationCommand>(payload)
        .map(Command::Authorize)
        .map_err(|e| e.to_string())
}

fn decode_file_sync(payload: Value) -> Result<Command, String> {
    serde_json::from_value::<SyncCommand>(payload)
        .map(Command::Sync)
        .map_err(|e| e.to_string())
}

/// Decodes an already-parsed envelope into its command
///
/// # Errors
///
/// - `DecodeError::UnknownType` if no decoder is registered for `event_type`
/// - `DecodeError::Schema` if the payload does not match the expected schema
pub fn decode_envelope(envelope: Envelope) -> Result<Command, DecodeError> {
    let entry = DECODERS
        .iter()
        .find(|entry| entry.event_type == envelope.event_type)
        .ok_or_else(|| DecodeError::UnknownType(envelope.event_type.clone()))?;

    (entry.decode)(envelope.payload).map_err(|reason| DecodeError::Schema {
        schema: entry.schema,
        reason,
    })
}

/// Decodes a raw broker body into a command
///
/// # Errors
///
/// Returns `DecodeError::MalformedEnvelope` when the body is not an envelope,
/// otherwise the errors of [`decode_envelope`].
pub fn decode(body: &[u8]) -> Result<Command, DecodeError> {
    decode_envelope(Envelope::from_body(body)?)
}

/// Builds the envelope that decodes back into `command`
pub fn encode(command: &Command) -> Envelope {
    match command {
        Command::Authorize(cmd) => Envelope::new(AUTHORIZATION_EVENT, to_value(cmd)),
        Command::Sync(cmd) => Envelope::new(FILE_SYNC_EVENT, to_value(cmd)),
        Command::SyncBatch(batch) => Envelope::new(S3_EVENT, s3_event::encode_notification(batch)),
    }
}

/// Serializes `command` into a broker body
pub fn encode_to_vec(command: &Command) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&encode(command))
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    // Command structs contain only strings and integers.
    serde_json::to_value(value).unwrap_or(Value::Null)
}
