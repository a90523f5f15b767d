//! HTTP request handlers.

pub mod nix;

pub use nix::*;
