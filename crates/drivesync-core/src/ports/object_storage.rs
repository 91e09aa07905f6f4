//! Object storage port (driven/secondary port)

use std::fmt;

use bytes::Bytes;
use futures_util::stream::BoxStream;

/// Streamed object body
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// An object opened for reading
pub struct StoredObject {
    /// Size declared by the storage service
    pub content_length: u64,
    pub body: ByteStream,
}

impl fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredObject")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Port trait for reading objects by bucket and key
#[async_trait::async_trait]
pub trait IObjectStorage: Send + Sync {
    /// Opens the object at `bucket`/`key` as a stream with its declared length
    async fn get_object(&self, bucket: &str, key: &str) -> anyhow::Result<StoredObject>;
}
