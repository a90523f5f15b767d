//! SHA-256 hashes in the encodings Nix uses on the wire.

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

const SHA256_LEN: usize = 32;
const NIX32_LEN: usize = 52;
const HEX_LEN: usize = 64;

/// A SHA-256 content hash represented as 32 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; SHA256_LEN]);

impl ContentHash {
    pub fn from_bytes(bytes: [u8; SHA256_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SHA256_LEN] {
        &self.0
    }

    /// Compute SHA-256 hash of data.
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        let arr: [u8; SHA256_LEN] = bytes.try_into().map_err(|_| {
            crate::Error::InvalidHash(format!(
                "expected {SHA256_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Parse from standard base64.
    pub fn from_base64(s: &str) -> crate::Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(|e| crate::Error::InvalidHash(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }

    /// Parse from lowercase or uppercase hex.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        if s.len() != HEX_LEN || !s.is_ascii() {
            return Err(crate::Error::InvalidHash(format!(
                "expected {HEX_LEN} hex chars, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; SHA256_LEN];
        for (i, pair) in s.as_bytes().chunks(2).enumerate() {
            let digits =
                std::str::from_utf8(pair).map_err(|e| crate::Error::InvalidHash(e.to_string()))?;
            bytes[i] = u8::from_str_radix(digits, 16)
                .map_err(|e| crate::Error::InvalidHash(e.to_string()))?;
        }
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse from Nix's base32 alphabet.
    pub fn from_nix_base32(s: &str) -> crate::Result<Self> {
        let bytes = nix_base32::from_nix_base32(s)
            .ok_or_else(|| crate::Error::InvalidHash(format!("invalid nix base32: {s}")))?;
        Self::from_slice(&bytes)
    }

    pub fn to_nix_base32(&self) -> String {
        nix_base32::to_nix_base32(&self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// The SHA-256 of a NAR (or of its compressed file) as it appears in narinfo.
///
/// Accepts the three spellings Nix emits: `sha256:<nix32>`, `sha256:<hex>` and
/// SRI `sha256-<base64>`. Always renders as `sha256:<nix32>`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NarHash(ContentHash);

impl NarHash {
    pub fn from_content_hash(hash: ContentHash) -> Self {
        Self(hash)
    }

    pub fn content_hash(&self) -> &ContentHash {
        &self.0
    }

    /// Parse any of the accepted spellings.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if let Some(digest) = s.strip_prefix("sha256:") {
            let hash = match digest.len() {
                NIX32_LEN => ContentHash::from_nix_base32(digest)?,
                HEX_LEN => ContentHash::from_hex(digest)?,
                n => {
                    return Err(crate::Error::InvalidHash(format!(
                        "unexpected sha256 digest length {n}"
                    )));
                }
            };
            return Ok(Self(hash));
        }
        if let Some(b64) = s.strip_prefix("sha256-") {
            return Ok(Self(ContentHash::from_base64(b64)?));
        }
        Err(crate::Error::InvalidHash(format!(
            "expected sha256 hash, got: {s}"
        )))
    }

    /// SRI format (`sha256-<base64>`).
    pub fn to_sri(&self) -> String {
        format!("sha256-{}", self.0.to_base64())
    }

    pub fn to_nix_base32(&self) -> String {
        self.0.to_nix_base32()
    }

    /// Nix narinfo format (`sha256:<nix32>`).
    pub fn to_nix_string(&self) -> String {
        format!("sha256:{}", self.to_nix_base32())
    }
}

impl fmt::Debug for NarHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NarHash({})", self.to_nix_string())
    }
}

impl fmt::Display for NarHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_nix_string())
    }
}
