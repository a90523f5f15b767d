//! Package registry gRPC service.

use meshix_core::Package;
use meshix_proto::MeshixService;
use meshix_proto::proto::{
    ListPackagesRequest, ListPackagesResponse, PushPackageRequest, PushPackageResponse,
};
use meshix_registry::{PackageRepo, RegistryError, RegistryStore};
use std::sync::Arc;
use tonic::{Request, Response, Status};

pub struct RegistryService {
    registry: Arc<dyn RegistryStore>,
}

impl RegistryService {
    pub fn new(registry: Arc<dyn RegistryStore>) -> Self {
        Self { registry }
    }
}

fn registry_status(err: RegistryError) -> Status {
    match err {
        RegistryError::Invalid(msg) => Status::invalid_argument(msg),
        other => {
            tracing::error!(error = %other, "registry operation failed");
            Status::internal(other.to_string())
        }
    }
}

#[tonic::async_trait]
impl MeshixService for RegistryService {
    async fn push_package(
        &self,
        request: Request<PushPackageRequest>,
    ) -> Result<Response<PushPackageResponse>, Status> {
        let package = request
            .into_inner()
            .package
            .ok_or_else(|| Status::invalid_argument("package is required"))?;
        if package.nix_metadata.is_none() {
            return Err(Status::invalid_argument("package.nix_metadata is required"));
        }

        let package = Package::from(package);
        let row = self
            .registry
            .put_package(&package)
            .await
            .map_err(registry_status)?;

        tracing::info!(
            id = row.id,
            name = %package.name,
            version = %package.version,
            store_path = %package.nix_metadata.store_path,
            "package registered"
        );
        Ok(Response::new(PushPackageResponse {}))
    }

    async fn list_packages(
        &self,
        _request: Request<ListPackagesRequest>,
    ) -> Result<Response<ListPackagesResponse>, Status> {
        let rows = self
            .registry
            .list_packages()
            .await
            .map_err(registry_status)?;

        tracing::debug!(count = rows.len(), "listing packages");
        let packages = rows
            .into_iter()
            .map(|row| Package::from(row).into())
            .collect();
        Ok(Response::new(ListPackagesResponse { packages }))
    }
}
