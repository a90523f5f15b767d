//! Package registry client.

use crate::error::RegistryError;
use async_trait::async_trait;
use meshix_core::Package;
use meshix_proto::{MeshixServiceClient, proto};
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tracing::instrument;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Where built packages are registered.
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    async fn push_package(&self, package: &Package) -> Result<(), RegistryError>;

    async fn list_packages(&self) -> Result<Vec<Package>, RegistryError>;
}

/// Registry reached over gRPC. Connects per call.
#[derive(Debug, Clone)]
pub struct GrpcRegistry {
    endpoint: Endpoint,
}

impl GrpcRegistry {
    pub fn new(url: impl Into<String>) -> Result<Self, RegistryError> {
        let url = url.into();
        let endpoint = Endpoint::from_shared(url.clone())
            .map_err(|source| RegistryError::InvalidUrl { url, source })?
            .connect_timeout(CONNECT_TIMEOUT);
        Ok(Self { endpoint })
    }

    async fn client(&self) -> Result<MeshixServiceClient<Channel>, RegistryError> {
        let channel = self
            .endpoint
            .connect()
            .await
            .map_err(RegistryError::Connect)?;
        Ok(MeshixServiceClient::new(channel))
    }
}

#[async_trait]
impl PackageRegistry for GrpcRegistry {
    #[instrument(skip(self, package), fields(name = %package.name, version = %package.version))]
    async fn push_package(&self, package: &Package) -> Result<(), RegistryError> {
        let request = proto::PushPackageRequest {
            package: Some(package.clone().into()),
        };
        self.client().await?.push_package(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_packages(&self) -> Result<Vec<Package>, RegistryError> {
        let response = self
            .client()
            .await?
            .list_packages(proto::ListPackagesRequest {})
            .await?;
        Ok(response
            .into_inner()
            .packages
            .into_iter()
            .map(Package::from)
            .collect())
    }
}
