//! Store watcher.
//!
//! Nix holds `<store path>.lock` while it builds a path and removes it once
//! the path is complete. The watcher subscribes to the store directory and
//! turns every lock removal into a [`CompletionEvent`] on a bounded queue.
//!
//! The notification callback hands paths over with a blocking send, so a
//! full queue stalls event intake until the uploader catches up.

use crate::error::WatchError;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_STORE_DIR: &str = "/nix/store";

/// Completed paths waiting for upload.
pub const QUEUE_CAPACITY: usize = 1000;

const LOCK_SUFFIX: &str = ".lock";

/// Sources and derivations are build inputs, never published.
const SKIPPED_SUFFIXES: [&str; 2] = ["-source", ".drv"];

/// A store path whose build finished, stamped when the lock removal was seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEvent {
    pub path: PathBuf,
    pub observed_at: SystemTime,
}

impl CompletionEvent {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            observed_at: SystemTime::now(),
        }
    }
}

/// The bounded queue between watcher and uploader.
pub fn queue() -> (mpsc::Sender<CompletionEvent>, mpsc::Receiver<CompletionEvent>) {
    mpsc::channel(QUEUE_CAPACITY)
}

/// Map a removed lock file to the store path whose build it guarded.
pub fn completed_store_path(removed: &Path) -> Option<PathBuf> {
    let removed = removed.to_str()?;
    let candidate = removed.strip_suffix(LOCK_SUFFIX)?;
    if candidate.is_empty() || SKIPPED_SUFFIXES.iter().any(|s| candidate.ends_with(s)) {
        return None;
    }
    Some(PathBuf::from(candidate))
}

/// Queue the completed store paths carried by one notification.
///
/// Blocks while the queue is full. Must not be called from async context.
fn forward_event(event: &Event, tx: &mpsc::Sender<CompletionEvent>) {
    if !matches!(event.kind, EventKind::Remove(_)) {
        return;
    }
    for path in event.paths.iter().filter_map(|p| completed_store_path(p)) {
        debug!(path = %path.display(), "store path completed");
        if tx.blocking_send(CompletionEvent::new(path)).is_err() {
            debug!("upload queue closed, dropping event");
            return;
        }
    }
}

/// An active subscription on the store directory.
///
/// Dropping it releases the subscription.
pub struct StoreWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl StoreWatcher {
    /// Subscribe to `root` recursively. Errors here are fatal to the caller.
    pub fn start(root: impl AsRef<Path>, tx: mpsc::Sender<CompletionEvent>) -> Result<Self, WatchError> {
        let root = root.as_ref().to_path_buf();
        let subscribe_error = |source| WatchError::Subscribe {
            path: root.display().to_string(),
            source,
        };

        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => forward_event(&event, &tx),
                Err(err) => warn!(%err, "store watcher error"),
            })
            .map_err(subscribe_error)?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(subscribe_error)?;

        info!(root = %root.display(), "watching store for completed builds");
        Ok(Self {
            root,
            _watcher: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keep the subscription alive until `cancel` fires, then release it.
    pub async fn run_until_cancelled(self, cancel: CancellationToken) {
        cancel.cancelled().await;
        info!(root = %self.root.display(), "store watcher stopped");
    }
}

/// Watch `root` until cancelled, queueing completed store paths on `tx`.
pub async fn watch_store(
    root: impl AsRef<Path>,
    tx: mpsc::Sender<CompletionEvent>,
    cancel: CancellationToken,
) -> Result<(), WatchError> {
    let watcher =
        StoreWatcher::start(root, tx).inspect_err(|err| error!(%err, "store watch failed"))?;
    watcher.run_until_cancelled(cancel).await;
    Ok(())
}
