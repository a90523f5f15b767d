//! Upload pipeline: the single consumer of the watcher queue.

use crate::error::BuildResult;
use crate::nix::Nix;
use crate::watcher::CompletionEvent;
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Copies one completed store path to a cache.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, path: &Path) -> BuildResult<()>;
}

/// Uploads with `nix copy --to <cache> <path>`.
#[derive(Debug, Clone)]
pub struct NixCopyUploader {
    nix: Nix,
    cache: String,
}

impl NixCopyUploader {
    pub fn new(nix: Nix, cache: impl Into<String>) -> Self {
        Self {
            nix,
            cache: cache.into(),
        }
    }
}

#[async_trait]
impl Uploader for NixCopyUploader {
    async fn upload(&self, path: &Path) -> BuildResult<()> {
        self.nix
            .copy_path(&self.cache, &path.to_string_lossy())
            .await
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadStats {
    pub uploaded: usize,
    pub failed: usize,
}

/// Drain `rx` one path at a time, in arrival order.
///
/// Failed uploads are logged and skipped. Returns when the queue closes or
/// `cancel` fires; an upload already in flight is allowed to finish.
pub async fn run_upload_pipeline<U: Uploader>(
    mut rx: mpsc::Receiver<CompletionEvent>,
    uploader: U,
    cancel: CancellationToken,
) -> UploadStats {
    let mut stats = UploadStats::default();
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(event) => event,
                None => break,
            },
        };

        let path = event.path.display();
        match uploader.upload(&event.path).await {
            Ok(()) => {
                stats.uploaded += 1;
                let since_completion = event.observed_at.elapsed().unwrap_or_default();
                info!(%path, ?since_completion, "uploaded");
            }
            Err(err) => {
                stats.failed += 1;
                error!(%path, %err, "upload failed");
            }
        }
    }
    rx.close();
    stats
}
