//! Core domain types shared across the Meshix binary cache and package registry.
//!
//! This crate defines the data model every other crate speaks:
//! - Store path identifiers and NAR hashes
//! - Narinfo records, fingerprints and signatures
//! - Registry packages and their Nix metadata
//! - Shared configuration types

pub mod config;
pub mod error;
pub mod hash;
pub mod narinfo;
pub mod package;
pub mod store_path;

pub use error::{Error, Result};
pub use hash::{ContentHash, NarHash};
pub use narinfo::{NarInfo, Signature};
pub use package::{NixMetadata, Package};
pub use store_path::{StorePath, StorePathHash};
