//! Package repository trait.

use crate::error::RegistryResult;
use crate::models::PackageRow;
use async_trait::async_trait;
use meshix_core::Package;

/// Append-only package log.
#[async_trait]
pub trait PackageRepo: Send + Sync {
    /// Append a package. Duplicates of earlier entries are appended too.
    async fn put_package(&self, package: &Package) -> RegistryResult<PackageRow>;

    /// Every package, oldest first.
    async fn list_packages(&self) -> RegistryResult<Vec<PackageRow>>;
}
