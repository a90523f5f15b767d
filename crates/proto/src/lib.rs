//! Wire types for the Meshix registry RPC.
//!
//! Generated from `proto/meshix/v1/meshix.proto`, plus conversions to and
//! from the domain [`Package`].

use meshix_core::Package;

pub mod proto {
    tonic::include_proto!("meshix.v1");
}

pub use proto::meshix_service_client::MeshixServiceClient;
pub use proto::meshix_service_server::{MeshixService, MeshixServiceServer};

impl From<Package> for proto::Package {
    fn from(pkg: Package) -> Self {
        Self {
            name: pkg.name,
            version: pkg.version,
            nix_metadata: Some(proto::NixMetadata {
                store_path: pkg.nix_metadata.store_path,
                main_bin: pkg.nix_metadata.main_bin,
            }),
        }
    }
}

/// A wire package with no `nix_metadata` becomes one with empty fields,
/// which domain validation then rejects.
impl From<proto::Package> for Package {
    fn from(pkg: proto::Package) -> Self {
        let meta = pkg.nix_metadata.unwrap_or_default();
        Package::new(pkg.name, pkg.version, meta.store_path, meta.main_bin)
    }
}
