//! Nix store path identifiers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of the base32 digest that prefixes every store path basename.
pub const HASH_LEN: usize = 32;

/// The digest portion of a store path, also the key of its narinfo.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorePathHash(String);

impl StorePathHash {
    pub fn new(hash: impl Into<String>) -> crate::Result<Self> {
        let hash = hash.into();
        if hash.len() != HASH_LEN {
            return Err(crate::Error::InvalidStorePath(format!(
                "store path hash must be {HASH_LEN} chars, got {}",
                hash.len()
            )));
        }
        // Nix base32 alphabet omits e, o, t, u
        if let Some(c) = hash
            .chars()
            .find(|c| !matches!(c, '0'..='9' | 'a'..='d' | 'f'..='n' | 'p'..='s' | 'v'..='z'))
        {
            return Err(crate::Error::InvalidStorePath(format!(
                "invalid character in store path hash: {c}"
            )));
        }
        Ok(Self(hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StorePathHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorePathHash({self})")
    }
}

impl fmt::Display for StorePathHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A full store path, `<store dir>/<hash>-<name>`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorePath {
    hash: StorePathHash,
    name: String,
}

impl StorePath {
    pub const STORE_DIR: &'static str = "/nix/store";

    /// Parse a full store path string.
    pub fn parse(path: &str) -> crate::Result<Self> {
        let basename = path
            .strip_prefix(Self::STORE_DIR)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| {
                crate::Error::InvalidStorePath(format!("must start with {}/", Self::STORE_DIR))
            })?;
        Self::from_basename(basename)
    }

    /// Parse a basename (`hash-name`) without the store directory.
    pub fn from_basename(basename: &str) -> crate::Result<Self> {
        if !basename.is_ascii() {
            return Err(crate::Error::InvalidStorePath(
                "store path contains non-ASCII characters".to_string(),
            ));
        }
        if basename.len() < HASH_LEN + 2 {
            return Err(crate::Error::InvalidStorePath("path too short".to_string()));
        }
        let (hash, rest) = basename.split_at(HASH_LEN);
        let name = rest.strip_prefix('-').ok_or_else(|| {
            crate::Error::InvalidStorePath("expected '-' after hash".to_string())
        })?;
        Self::new(StorePathHash::new(hash)?, name)
    }

    pub fn new(hash: StorePathHash, name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(crate::Error::InvalidStorePath(
                "name cannot be empty".to_string(),
            ));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || "+-._?=".contains(*c)))
        {
            return Err(crate::Error::InvalidStorePath(format!(
                "invalid character in name: {c}"
            )));
        }
        Ok(Self { hash, name })
    }

    pub fn hash(&self) -> &StorePathHash {
        &self.hash
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn to_path_string(&self) -> String {
        format!("{}/{}-{}", Self::STORE_DIR, self.hash, self.name)
    }

    pub fn basename(&self) -> String {
        format!("{}-{}", self.hash, self.name)
    }
}

impl FromStr for StorePath {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorePath({})", self.to_path_string())
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path_string())
    }
}

impl Serialize for StorePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_path_string())
    }
}

impl<'de> Deserialize<'de> for StorePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
