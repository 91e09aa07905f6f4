//! Domain model for the drivesync worker
//!
//! Pure value types with no I/O: decoded commands, the persisted integration
//! record, and the upload descriptor derived from a sync command.

pub mod command;
pub mod destination;
pub mod errors;
pub mod integration;
pub mod owner;

pub use command::{AuthorizationCommand, Command, SyncBatchCommand, SyncCommand};
pub use destination::{DriveTarget, UploadDescriptor, UploadRoute, SIMPLE_UPLOAD_THRESHOLD};
pub use errors::DomainError;
pub use integration::IntegrationRecord;
pub use owner::OwnerId;
