//! Application state shared across handlers.

use meshix_core::config::AppConfig;
use meshix_registry::RegistryStore;
use meshix_signer::NarInfoSigner;
use meshix_storage::ObjectStore;
use std::sync::Arc;

/// Shared application state.
///
/// Everything here is built once at startup and only read afterwards.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Narinfo and NAR objects.
    pub storage: Arc<dyn ObjectStore>,
    /// Package registry behind the gRPC service.
    pub registry: Arc<dyn RegistryStore>,
    /// Cache key pair; every narinfo write is signed with it.
    pub signer: Arc<NarInfoSigner>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        registry: Arc<dyn RegistryStore>,
        signer: NarInfoSigner,
    ) -> Self {
        Self {
            config: Arc::new(config),
            storage,
            registry,
            signer: Arc::new(signer),
        }
    }

    /// Bucket holding the cache objects.
    pub fn bucket(&self) -> &str {
        &self.config.cache.bucket
    }
}
