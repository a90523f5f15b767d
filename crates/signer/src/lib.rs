//! Cache signing keys for Meshix.
//!
//! Loads Nix-format Ed25519 key pairs, signs narinfo fingerprints and
//! verifies the resulting `Sig:` lines.

pub mod error;
pub mod key;
pub mod signer;

pub use error::{SignerError, SignerResult};
pub use key::{CacheKeyPair, PublicKey, SecretKey};
pub use signer::{NarInfoSigner, verify_narinfo, verify_signature};
