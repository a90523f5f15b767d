//! Database rows for the registry schema.

use meshix_core::Package;
use sqlx::FromRow;
use time::OffsetDateTime;

/// A registered package as stored.
#[derive(Debug, Clone, FromRow)]
pub struct PackageRow {
    /// Monotonic insertion sequence; listing orders by it.
    pub id: i64,
    pub name: String,
    pub version: String,
    pub nix_store_path: String,
    pub nix_main_bin: String,
    pub created_at: OffsetDateTime,
}

impl From<PackageRow> for Package {
    fn from(row: PackageRow) -> Self {
        Package::new(row.name, row.version, row.nix_store_path, row.nix_main_bin)
    }
}
