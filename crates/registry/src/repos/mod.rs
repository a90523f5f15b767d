//! Repository traits for registry operations.

pub mod packages;

pub use packages::PackageRepo;
