//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads and writes.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Metadata about a stored object.
#[derive(Clone, Debug)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
    pub last_modified: Option<time::OffsetDateTime>,
}

/// Blob store addressed by bucket and key.
///
/// Writes overwrite: storing the same key twice leaves the last value.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Stream an object's content.
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<ByteStream>;

    /// Get an object's size without fetching content.
    async fn stat(&self, bucket: &str, key: &str) -> StorageResult<ObjectMeta>;

    /// Store `length` bytes read from `data`.
    ///
    /// Fails with `LengthMismatch` if the stream yields a different number of bytes;
    /// nothing is stored in that case.
    async fn put(&self, bucket: &str, key: &str, data: ByteStream, length: u64)
    -> StorageResult<()>;

    /// Store an in-memory object.
    async fn put_bytes(&self, bucket: &str, key: &str, data: Bytes) -> StorageResult<()> {
        let length = data.len() as u64;
        let stream: ByteStream = Box::pin(futures::stream::once(async move { Ok(data) }));
        self.put(bucket, key, stream, length).await
    }

    /// Static identifier for logs ("filesystem", "s3").
    fn backend_name(&self) -> &'static str;

    /// Verify the backend can serve `bucket`. Called once before serving.
    async fn health_check(&self, _bucket: &str) -> StorageResult<()> {
        Ok(())
    }
}
