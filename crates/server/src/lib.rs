//! Meshix server: Nix binary cache over HTTP and the package registry over
//! gRPC, multiplexed on one port.
//!
//! - `/cache/nix-cache-info`
//! - `/cache/{hash}.narinfo`: signed on upload
//! - `/cache/{hash}.nar.{codec}` and `/cache/nar/{hash}.nar.{codec}`
//! - `meshix.v1.MeshixService`: `PushPackage`, `ListPackages`

pub mod error;
pub mod grpc;
pub mod handlers;
pub mod mux;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use grpc::RegistryService;
pub use mux::{Multiplexer, create_app};
pub use routes::create_router;
pub use state::AppState;
