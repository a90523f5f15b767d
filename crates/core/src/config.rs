//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Listener configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the multiplexed HTTP/gRPC listener binds to.
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "0.0.0.0:8088".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Binary cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Bucket holding narinfo and NAR objects.
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

fn default_bucket() -> String {
    "nix".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
        }
    }
}

/// Object storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem; each bucket is a directory under `path`.
    Filesystem { path: PathBuf },
    /// S3-compatible object store.
    S3 {
        /// Endpoint URL (MinIO, Garage, ...). Defaults to a local MinIO.
        #[serde(default = "default_s3_endpoint")]
        endpoint: Option<String>,
        region: Option<String>,
        /// Falls back to AWS_ACCESS_KEY_ID when unset.
        access_key_id: Option<String>,
        /// Falls back to AWS_SECRET_ACCESS_KEY when unset.
        secret_access_key: Option<String>,
        /// Address buckets as `endpoint/bucket/key`. Required by MinIO.
        #[serde(default = "default_force_path_style")]
        force_path_style: bool,
    },
}

fn default_s3_endpoint() -> Option<String> {
    Some("http://localhost:9001".to_string())
}

fn default_force_path_style() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id, secret_access_key) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            StorageConfig::Filesystem { .. } => Ok(()),
        }
    }
}

/// Package registry database configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RegistryConfig {
    Sqlite {
        path: PathBuf,
        /// Busy timeout in seconds.
        #[serde(default = "default_busy_timeout_secs")]
        busy_timeout_secs: u64,
    },
}

fn default_busy_timeout_secs() -> u64 {
    5
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/meshix.db"),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

/// Where the cache signing key comes from.
///
/// Keys use the Nix secret key format, `name:base64(secret || public)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SigningConfig {
    File { path: PathBuf },
    Env { var: String },
    /// Inline key (avoid outside development).
    Value { key: String },
}

/// Complete server configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Required at startup; may also be supplied on the command line.
    pub signing: Option<SigningConfig>,
}

impl AppConfig {
    /// Filesystem storage and a SQLite registry under the default paths.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self::default()
    }
}
