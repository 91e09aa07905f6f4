//! S3 event notifications
//!
//! Buckets can publish `ObjectCreated` notifications straight to the queue.
//! Those bodies have no `event_type`; each record is flattened into a
//! [`SyncCommand`] using the object's user metadata:
//!
//! | Metadata key | Command field  |
//! |--------------|----------------|
//! | `owner-id`   | `owner_id`     |
//! | `upload-to`  | `destination`  |

use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::{Command, OwnerId, SyncBatchCommand, SyncCommand};

#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(rename = "Records", default)]
    records: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct Record {
    #[serde(rename = "eventName", default)]
    event_name: String,
    s3: Entity,
}

#[derive(Debug, Deserialize)]
struct Entity {
    bucket: Bucket,
    object: Object,
}

#[derive(Debug, Deserialize)]
struct Bucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Object {
    key: String,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(rename = "owner-id", default)]
    owner_id: Option<OwnerIdRepr>,
    #[serde(rename = "upload-to", default)]
    upload_to: Option<String>,
}

/// Metadata values are strings in S3, but producers also send bare integers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OwnerIdRepr {
    Number(i64),
    Text(String),
}

impl OwnerIdRepr {
    fn parse(&self) -> Result<OwnerId, String> {
        match self {
            OwnerIdRepr::Number(n) => Ok(OwnerId::new(*n)),
            OwnerIdRepr::Text(s) => s.parse::<OwnerId>().map_err(|e| e.to_string()),
        }
    }
}

/// S3 encodes object keys as form values: `+` for spaces, `%XX` escapes.
fn decode_key(key: &str) -> Result<String, String> {
    let spaced = key.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|k| k.into_owned())
        .map_err(|e| format!("invalid object key encoding {key:?}: {e}"))
}

fn encode_key(key: &str) -> String {
    urlencoding::encode(key).replace("%2F", "/")
}

/// Decodes an S3 notification document into a sync batch
///
/// Only `ObjectCreated:*` records are kept; other events (removals,
/// restores) produce no work.
pub(super) fn decode_notification(payload: Value) -> Result<Command, String> {
    let notification: Notification =
        serde_json::from_value(payload).map_err(|e| e.to_string())?;

    let mut items = Vec::with_capacity(notification.records.len());
    for (index, record) in notification.records.into_iter().enumerate() {
        if !record.event_name.starts_with("ObjectCreated:") {
            continue;
        }

        let owner_id = record
            .s3
            .object
            .metadata
            .owner_id
            .as_ref()
            .ok_or_else(|| format!("record {index} is missing owner-id metadata"))?
            .parse()
            .map_err(|e| format!("record {index}: {e}"))?;

        items.push(SyncCommand {
            owner_id,
            bucket: record.s3.bucket.name,
            key: decode_key(&record.s3.object.key)?,
            destination: record.s3.object.metadata.upload_to.unwrap_or_default(),
        });
    }

    Ok(Command::SyncBatch(SyncBatchCommand { items }))
}

/// Encodes a sync batch as an S3 notification document
pub(super) fn encode_notification(batch: &SyncBatchCommand) -> Value {
    let records: Vec<Value> = batch
        .items
        .iter()
        .map(|item| {
            json!({
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": item.bucket },
                    "object": {
                        "key": encode_key(&item.key),
                        "metadata": {
                            "owner-id": item.owner_id.to_string(),
                            "upload-to": item.destination,
                        }
                    }
                }
            })
        })
        .collect();

    json!({ "Records": records })
}
