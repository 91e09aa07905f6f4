//! Typed commands decoded from queued envelopes
//!
//! Every message the worker accepts decodes into exactly one [`Command`]
//! variant. The set is closed: adding a variant means adding a decoder
//! entry in [`crate::messages`] and a handler in [`crate::registry`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::owner::OwnerId;

/// Request to bind an owner to a OneDrive refresh token
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCommand {
    pub owner_id: OwnerId,
    pub user_id: String,
    pub refresh_token: String,
}

impl fmt::Debug for AuthorizationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationCommand")
            .field("owner_id", &self.owner_id)
            .field("user_id", &self.user_id)
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Request to copy one stored object into the owner's drive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCommand {
    pub owner_id: OwnerId,
    pub bucket: String,
    pub key: String,
    /// `[<drive_id>:]<folder_path>`, see [`super::DriveTarget::parse`]
    pub destination: String,
}

/// Several sync requests delivered in one message (S3 event notifications)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncBatchCommand {
    pub items: Vec<SyncCommand>,
}

/// A decoded unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Authorize(AuthorizationCommand),
    Sync(SyncCommand),
    SyncBatch(SyncBatchCommand),
}

impl Command {
    /// Short variant name used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Authorize(_) => "authorize",
            Command::Sync(_) => "sync",
            Command::SyncBatch(_) => "sync_batch",
        }
    }
}
