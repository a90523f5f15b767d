//! Server test utilities.

use meshix_core::config::{AppConfig, RegistryConfig, StorageConfig};
use meshix_registry::{RegistryStore, SqliteStore};
use meshix_server::{AppState, create_app};
use meshix_signer::NarInfoSigner;
use meshix_storage::{FilesystemBackend, ObjectStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_KEY_NAME: &str = "meshix-test-1";

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    /// Multiplexed application (HTTP cache + gRPC registry).
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage and registry.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("storage");
        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );

        let db_path = temp_dir.path().join("registry.db");
        let registry: Arc<dyn RegistryStore> = Arc::new(
            SqliteStore::new(&db_path, 5)
                .await
                .expect("Failed to create registry store"),
        );

        let mut config = AppConfig {
            storage: StorageConfig::Filesystem { path: storage_path },
            registry: RegistryConfig::Sqlite {
                path: db_path,
                busy_timeout_secs: 5,
            },
            ..AppConfig::for_testing()
        };
        modifier(&mut config);

        let state = AppState::new(
            config,
            storage,
            registry,
            NarInfoSigner::generate(TEST_KEY_NAME),
        );
        let router = create_app(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    pub fn storage(&self) -> Arc<dyn ObjectStore> {
        self.state.storage.clone()
    }

    /// Serve the application on an ephemeral local port.
    pub async fn spawn(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");
        let app = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server failed");
        });
        addr
    }
}
