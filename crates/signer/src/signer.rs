//! Narinfo signing and verification.

use crate::error::{SignerError, SignerResult};
use crate::key::{CacheKeyPair, PublicKey};
use base64::Engine;
use ed25519_dalek::Signer as _;
use ed25519_dalek::Verifier;
use meshix_core::narinfo::{NarInfo, Signature};

/// Signs narinfo records with the cache key pair.
///
/// Built once at startup and shared read-only by every request.
#[derive(Debug)]
pub struct NarInfoSigner {
    keypair: CacheKeyPair,
}

impl NarInfoSigner {
    pub fn new(keypair: CacheKeyPair) -> Self {
        Self { keypair }
    }

    pub fn from_nix_secret_key(s: &str) -> SignerResult<Self> {
        Ok(Self::new(CacheKeyPair::from_nix_secret_key(s)?))
    }

    /// Signer with a fresh random key, for tests and local experiments.
    pub fn generate(key_name: impl Into<String>) -> Self {
        Self::new(CacheKeyPair::generate(key_name))
    }

    pub fn key_name(&self) -> &str {
        &self.keypair.name
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.keypair.public
    }

    /// Public key in the form consumers put in `trusted-public-keys`.
    pub fn nix_public_key(&self) -> String {
        self.keypair.to_nix_public_key()
    }

    pub fn nix_secret_key(&self) -> String {
        self.keypair.to_nix_secret_key()
    }

    /// Append exactly one signature over the record's fingerprint.
    pub fn sign(&self, narinfo: &mut NarInfo) {
        let signature = self.sign_fingerprint(&narinfo.fingerprint());
        narinfo.add_signature(signature);
    }

    pub fn sign_fingerprint(&self, fingerprint: &str) -> Signature {
        let sig = self
            .keypair
            .secret
            .signing_key()
            .sign(fingerprint.as_bytes());
        let sig_b64 = base64::engine::general_purpose::STANDARD.encode(sig.to_bytes());
        Signature::new(&self.keypair.name, sig_b64)
    }
}

/// Verify one signature of a narinfo against a public key.
pub fn verify_signature(
    narinfo: &NarInfo,
    signature: &Signature,
    public_key: &PublicKey,
) -> SignerResult<()> {
    let sig_bytes = base64::engine::general_purpose::STANDARD
        .decode(&signature.signature)
        .map_err(|e| SignerError::InvalidSignature(format!("invalid base64: {e}")))?;

    let sig_array: [u8; 64] = sig_bytes.try_into().map_err(|bytes: Vec<u8>| {
        SignerError::InvalidSignature(format!("expected 64 bytes, got {}", bytes.len()))
    })?;
    let sig = ed25519_dalek::Signature::from_bytes(&sig_array);

    public_key
        .verifying_key()
        .verify(narinfo.fingerprint().as_bytes(), &sig)
        .map_err(|_| SignerError::VerificationFailed)
}

/// True if any signature on the narinfo verifies against a trusted key of the same name.
pub fn verify_narinfo(narinfo: &NarInfo, trusted_keys: &[(String, PublicKey)]) -> bool {
    narinfo.signatures.iter().any(|sig| {
        trusted_keys
            .iter()
            .filter(|(name, _)| name == &sig.key_name)
            .any(|(_, key)| verify_signature(narinfo, sig, key).is_ok())
    })
}
