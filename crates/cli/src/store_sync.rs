//! Watcher and uploader wired together through the bounded queue.

use crate::error::WatchError;
use crate::uploader::{UploadStats, Uploader, run_upload_pipeline};
use crate::watcher::{self, StoreWatcher};
use std::path::Path;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Subscribe to `store_dir` and start uploading completed paths.
///
/// The subscription is established before this returns, so a failure is
/// reported here. The handle resolves once `cancel` fires and both halves
/// have stopped.
pub fn spawn_store_sync<U>(
    store_dir: &Path,
    uploader: U,
    cancel: CancellationToken,
) -> Result<JoinHandle<UploadStats>, WatchError>
where
    U: Uploader + 'static,
{
    let (tx, rx) = watcher::queue();
    let watcher = StoreWatcher::start(store_dir, tx)?;
    let uploads = tokio::spawn(run_upload_pipeline(rx, uploader, cancel.clone()));

    Ok(tokio::spawn(async move {
        watcher.run_until_cancelled(cancel).await;
        let stats = uploads.await.unwrap_or_else(|err| {
            error!(%err, "upload pipeline panicked");
            UploadStats::default()
        });
        info!(uploaded = stats.uploaded, failed = stats.failed, "store sync finished");
        stats
    }))
}
