//! Registry store trait and the SQLite implementation.

use crate::error::RegistryResult;
use crate::models::PackageRow;
use crate::repos::PackageRepo;
use async_trait::async_trait;
use meshix_core::Package;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::instrument;

/// Combined registry store trait.
#[async_trait]
pub trait RegistryStore: PackageRepo + Send + Sync {
    /// Create the schema if it does not exist yet.
    async fn migrate(&self) -> RegistryResult<()>;

    /// Check database connectivity.
    async fn health_check(&self) -> RegistryResult<()>;
}

/// SQLite-backed registry.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub async fn new(path: impl AsRef<Path>, busy_timeout_secs: u64) -> RegistryResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(busy_timeout_secs));

        // one writer keeps appends serialized
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::info!(path = %path.display(), "registry database ready");
        Ok(store)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl RegistryStore for SqliteStore {
    async fn migrate(&self) -> RegistryResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> RegistryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl PackageRepo for SqliteStore {
    #[instrument(skip(self, package), fields(name = %package.name, version = %package.version))]
    async fn put_package(&self, package: &Package) -> RegistryResult<PackageRow> {
        package.validate()?;

        let row = sqlx::query_as::<_, PackageRow>(
            r#"
            INSERT INTO packages (name, version, nix_store_path, nix_main_bin, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, name, version, nix_store_path, nix_main_bin, created_at
            "#,
        )
        .bind(&package.name)
        .bind(&package.version)
        .bind(&package.nix_metadata.store_path)
        .bind(&package.nix_metadata.main_bin)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(id = row.id, "package appended");
        Ok(row)
    }

    async fn list_packages(&self) -> RegistryResult<Vec<PackageRow>> {
        let rows = sqlx::query_as::<_, PackageRow>(
            "SELECT id, name, version, nix_store_path, nix_main_bin, created_at FROM packages ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS packages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    nix_store_path TEXT NOT NULL,
    nix_main_bin TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_packages_name ON packages(name);
"#;
