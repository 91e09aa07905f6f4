//! drivesync AWS - Queue transport and object storage adapters
//!
//! ## Modules
//!
//! - [`sdk`] - Shared AWS SDK configuration (region, endpoint, credentials)
//! - [`sqs`] - `IMessageQueue` over Amazon SQS
//! - [`s3`] - `IObjectStorage` over Amazon S3 (or any S3-compatible store)

pub mod s3;
pub mod sdk;
pub mod sqs;

pub use s3::S3ObjectStorage;
pub use sqs::SqsMessageQueue;

/// Errors returned by the AWS adapters
#[derive(Debug, thiserror::Error)]
pub enum AwsError {
    /// ReceiveMessage failed
    #[error("failed to receive messages from {queue_url}: {detail}")]
    Receive { queue_url: String, detail: String },

    /// DeleteMessage failed
    #[error("failed to delete message {message_id}: {detail}")]
    Delete { message_id: String, detail: String },

    /// GetObject failed
    #[error("failed to get object {bucket}/{key}: {detail}")]
    GetObject {
        bucket: String,
        key: String,
        detail: String,
    },

    /// The service answered without a field the adapter relies on
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
