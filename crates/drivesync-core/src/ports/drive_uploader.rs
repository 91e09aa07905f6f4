//! Drive uploader port (driven/secondary port)

use crate::domain::{OwnerId, UploadDescriptor};

use super::object_storage::ByteStream;

/// Metadata of a file created or replaced by an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedItem {
    pub id: String,
    pub name: String,
    pub size: Option<u64>,
}

/// Port trait for writing files into an owner's drive
///
/// The caller chooses the method from [`UploadDescriptor::route`].
#[async_trait::async_trait]
pub trait IDriveUploader: Send + Sync {
    /// Uploads a file below the inline threshold in a single request
    async fn upload_small(
        &self,
        owner_id: OwnerId,
        descriptor: &UploadDescriptor,
        body: ByteStream,
    ) -> anyhow::Result<UploadedItem>;

    /// Uploads a file at or above the inline threshold
    ///
    /// The protocol is a resumable session: create the session, send the
    /// body in bounded chunks with `Content-Range` headers, and finalize.
    async fn upload_large(
        &self,
        owner_id: OwnerId,
        descriptor: &UploadDescriptor,
        body: ByteStream,
    ) -> anyhow::Result<UploadedItem>;
}
