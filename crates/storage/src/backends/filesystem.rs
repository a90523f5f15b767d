//! Local filesystem storage backend.
//!
//! Each bucket is a directory under the root; keys are files inside it.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, ObjectMeta, ObjectStore};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::instrument;
use uuid::Uuid;

/// Default chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Local filesystem object store.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Resolve `bucket/key` under the root, rejecting anything that could escape it.
    async fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        let bucket = bucket.to_string();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || Self::object_path_sync(&root, &bucket, &key))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    fn object_path_sync(root: &Path, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        for part in [bucket, key] {
            if part.is_empty() || part.starts_with('/') || part.starts_with('\\') {
                return Err(StorageError::InvalidKey(format!(
                    "invalid object address: {bucket}/{key}"
                )));
            }
            if !Path::new(part)
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
            {
                return Err(StorageError::InvalidKey(format!(
                    "contains unsafe path component: {bucket}/{key}"
                )));
            }
        }
        if bucket.contains('/') {
            return Err(StorageError::InvalidKey(format!(
                "bucket must be a single path segment: {bucket}"
            )));
        }

        let path = root.join(bucket).join(key);

        // a symlink planted under the root must not lead outside it
        let root_canonical = root.canonicalize()?;
        match std::fs::symlink_metadata(&path) {
            Ok(_) => {
                let canonical = path.canonicalize().map_err(|_| {
                    StorageError::InvalidKey(format!("dangling link: {bucket}/{key}"))
                })?;
                if !canonical.starts_with(&root_canonical) {
                    return Err(StorageError::InvalidKey(format!(
                        "resolved path escapes storage root: {bucket}/{key}"
                    )));
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(StorageError::Io(err)),
        }

        Ok(path)
    }

    fn map_io(err: std::io::Error, bucket: &str, key: &str) -> StorageError {
        if err.kind() == std::io::ErrorKind::NotFound {
            StorageError::not_found(bucket, key)
        } else {
            StorageError::Io(err)
        }
    }

    /// Copy the stream into `temp_path`, returning the number of bytes written.
    async fn write_temp(temp_path: &Path, mut data: ByteStream) -> StorageResult<u64> {
        let mut file = fs::File::create(temp_path).await?;
        let mut written = 0u64;
        while let Some(chunk) = data.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl ObjectStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<ByteStream> {
        let path = self.object_path(bucket, key).await?;
        let file = fs::File::open(&path)
            .await
            .map_err(|e| Self::map_io(e, bucket, key))?;

        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn stat(&self, bucket: &str, key: &str) -> StorageResult<ObjectMeta> {
        let path = self.object_path(bucket, key).await?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| Self::map_io(e, bucket, key))?;
        if !metadata.is_file() {
            return Err(StorageError::not_found(bucket, key));
        }

        Ok(ObjectMeta {
            size: metadata.len(),
            last_modified: metadata.modified().ok().map(Into::into),
        })
    }

    #[instrument(skip(self, data), fields(backend = "filesystem"))]
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: ByteStream,
        length: u64,
    ) -> StorageResult<()> {
        let path = self.object_path(bucket, key).await?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // temp + fsync + rename so readers never see a partial object
        let temp_name = format!(".tmp.{}", Uuid::new_v4());
        let temp_path = path.with_file_name(
            path.file_name()
                .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
                .unwrap_or_else(|| temp_name.clone()),
        );

        let written = match Self::write_temp(&temp_path, data).await {
            Ok(written) => written,
            Err(err) => {
                let _ = fs::remove_file(&temp_path).await;
                return Err(err);
            }
        };
        if written != length {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::LengthMismatch {
                declared: length,
                received: written,
            });
        }

        fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self, bucket: &str) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;
        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("storage root is not a directory: {:?}", self.root),
            )));
        }

        let bucket_dir = self.object_path(bucket, ".meshix-health-check").await?;
        if let Some(dir) = bucket_dir.parent() {
            fs::create_dir_all(dir).await?;
        }
        Ok(())
    }
}
