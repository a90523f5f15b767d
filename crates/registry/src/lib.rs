//! Package registry store for Meshix.
//!
//! Packages are appended by `PushPackage` and read back in insertion
//! order by `ListPackages`. The server only sees the narrow
//! [`PackageRepo`] surface; SQLite is the shipped implementation.

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{RegistryError, RegistryResult};
pub use repos::PackageRepo;
pub use store::{RegistryStore, SqliteStore};

use meshix_core::config::RegistryConfig;
use std::sync::Arc;

/// Create a registry store from configuration.
pub async fn from_config(config: &RegistryConfig) -> RegistryResult<Arc<dyn RegistryStore>> {
    match config {
        RegistryConfig::Sqlite {
            path,
            busy_timeout_secs,
        } => {
            let store = SqliteStore::new(path, *busy_timeout_secs).await?;
            Ok(Arc::new(store) as Arc<dyn RegistryStore>)
        }
    }
}
