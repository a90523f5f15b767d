//! Meshix client library.
//!
//! Builds flake packages, pushes them to a binary cache and registers
//! them with the Meshix registry. Also watches the local store and
//! uploads every path that finishes building.

pub mod config;
pub mod error;
pub mod nix;
pub mod orchestrator;
pub mod registry;
pub mod store_sync;
pub mod uploader;
pub mod watcher;

pub use error::{BuildError, BuildResult, RegistryError, WatchError};
pub use nix::Nix;
pub use orchestrator::{BuildOverrides, Orchestrator};
pub use registry::{GrpcRegistry, PackageRegistry};
pub use store_sync::spawn_store_sync;
pub use uploader::{NixCopyUploader, UploadStats, Uploader};
pub use watcher::{CompletionEvent, StoreWatcher};
