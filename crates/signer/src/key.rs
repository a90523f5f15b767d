//! Ed25519 keys in the Nix `name:base64` text format.

use crate::error::{SignerError, SignerResult};
use base64::Engine;
use ed25519_dalek::{SigningKey, VerifyingKey};
use std::fmt;

const SECRET_LEN: usize = 32;
const PUBLIC_LEN: usize = 32;

/// Split `name:base64` and decode the payload, checking its length.
fn decode_nix_key(s: &str, expected_len: usize) -> SignerResult<(String, Vec<u8>)> {
    let (name, b64) = s.trim().split_once(':').ok_or_else(|| {
        SignerError::KeyParsing("expected 'keyname:base64' format".to_string())
    })?;
    if name.is_empty() {
        return Err(SignerError::KeyParsing("key name is empty".to_string()));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|e| SignerError::KeyParsing(format!("invalid base64: {e}")))?;
    if bytes.len() != expected_len {
        return Err(SignerError::KeyParsing(format!(
            "expected {expected_len} bytes, got {}",
            bytes.len()
        )));
    }
    Ok((name.to_string(), bytes))
}

fn encode_nix_key(name: &str, bytes: &[u8]) -> String {
    let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("{name}:{b64}")
}

/// Secret half of a cache key.
pub struct SecretKey {
    inner: SigningKey,
}

impl SecretKey {
    pub fn generate() -> Self {
        let mut rng = rand_core::OsRng;
        Self {
            inner: SigningKey::generate(&mut rng),
        }
    }

    /// Parse `keyname:base64(secret || public)`.
    ///
    /// The embedded public half must match the one derived from the secret.
    pub fn from_nix_format(s: &str) -> SignerResult<(String, Self)> {
        let (name, bytes) = decode_nix_key(s, SECRET_LEN + PUBLIC_LEN)?;
        let (secret, public) = bytes.split_at(SECRET_LEN);

        let secret: [u8; SECRET_LEN] = secret
            .try_into()
            .map_err(|_| SignerError::KeyParsing("invalid secret key bytes".to_string()))?;
        let inner = SigningKey::from_bytes(&secret);

        if inner.verifying_key().as_bytes() != public {
            return Err(SignerError::KeyParsing(
                "public half does not match secret key".to_string(),
            ));
        }
        Ok((name, Self { inner }))
    }

    pub fn to_nix_format(&self, key_name: &str) -> String {
        let mut bytes = Vec::with_capacity(SECRET_LEN + PUBLIC_LEN);
        bytes.extend_from_slice(self.inner.as_bytes());
        bytes.extend_from_slice(self.inner.verifying_key().as_bytes());
        encode_nix_key(key_name, &bytes)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: self.inner.verifying_key(),
        }
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.inner
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED])")
    }
}

/// Public half of a cache key, as listed in a consumer's `trusted-public-keys`.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: VerifyingKey,
}

impl PublicKey {
    /// Parse `keyname:base64(public)`.
    pub fn from_nix_format(s: &str) -> SignerResult<(String, Self)> {
        let (name, bytes) = decode_nix_key(s, PUBLIC_LEN)?;
        let bytes: [u8; PUBLIC_LEN] = bytes
            .try_into()
            .map_err(|_| SignerError::KeyParsing("invalid public key bytes".to_string()))?;
        let inner = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| SignerError::KeyParsing(format!("invalid public key: {e}")))?;
        Ok((name, Self { inner }))
    }

    pub fn to_nix_format(&self, key_name: &str) -> String {
        encode_nix_key(key_name, self.inner.as_bytes())
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.inner
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b64 = base64::engine::general_purpose::STANDARD.encode(self.inner.as_bytes());
        write!(f, "PublicKey({}...)", &b64[..8])
    }
}

/// The process-wide signing identity of a cache.
pub struct CacheKeyPair {
    /// Key name (e.g., "cache.example.com-1").
    pub name: String,
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl CacheKeyPair {
    pub fn generate(name: impl Into<String>) -> Self {
        let secret = SecretKey::generate();
        let public = secret.public_key();
        Self {
            name: name.into(),
            secret,
            public,
        }
    }

    /// Load from a Nix secret key; the public key is derived.
    pub fn from_nix_secret_key(s: &str) -> SignerResult<Self> {
        let (name, secret) = SecretKey::from_nix_format(s)?;
        let public = secret.public_key();
        Ok(Self {
            name,
            secret,
            public,
        })
    }

    /// Load a Nix secret key file, as written by `nix key generate-secret`.
    pub fn from_file(path: &std::path::Path) -> SignerResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_nix_secret_key(&contents)
    }

    pub fn to_nix_secret_key(&self) -> String {
        self.secret.to_nix_format(&self.name)
    }

    pub fn to_nix_public_key(&self) -> String {
        self.public.to_nix_format(&self.name)
    }
}

impl fmt::Debug for CacheKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheKeyPair")
            .field("name", &self.name)
            .field("public", &self.public)
            .finish()
    }
}
