//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ICredentialStore`] - Persistent integration records and refresh tokens
//! - [`ITokenCipher`] - Encryption of refresh tokens at rest
//! - [`IObjectStorage`] - Streaming reads of stored objects
//! - [`IMessageQueue`] - Batch receive and acknowledgement of queued messages
//! - [`IDriveUploader`] - File uploads to the drive service
//! - [`IAccessTokenSource`] - Short-lived access tokens for an owner
//! - [`ICommandHandler`] - Execution of one decoded command

pub mod command_handler;
pub mod credential_store;
pub mod drive_uploader;
pub mod message_queue;
pub mod object_storage;
pub mod token_source;

pub use command_handler::ICommandHandler;
pub use credential_store::{ICredentialStore, ITokenCipher, PlaintextCipher};
pub use drive_uploader::{IDriveUploader, UploadedItem};
pub use message_queue::{IMessageQueue, QueueMessage};
pub use object_storage::{ByteStream, IObjectStorage, StoredObject};
pub use token_source::IAccessTokenSource;
