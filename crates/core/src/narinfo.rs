//! Narinfo records as served by a Nix binary cache.

use crate::hash::NarHash;
use crate::store_path::StorePath;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content type Nix expects for narinfo responses.
pub const NARINFO_CONTENT_TYPE: &str = "text/x-nix-narinfo";

const UNKNOWN_DERIVER: &str = "unknown-deriver";

/// Metadata describing one NAR in the cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarInfo {
    pub store_path: StorePath,
    /// NAR location relative to the cache root.
    pub url: String,
    /// Codec tag of the file at `url` (`none`, `xz`, `zstd`, ...).
    pub compression: String,
    /// Hash of the file at `url`.
    pub file_hash: Option<NarHash>,
    /// Size of the file at `url`.
    pub file_size: Option<u64>,
    /// Hash of the uncompressed NAR.
    pub nar_hash: NarHash,
    /// Size of the uncompressed NAR.
    pub nar_size: u64,
    pub references: Vec<StorePath>,
    pub deriver: Option<StorePath>,
    pub system: Option<String>,
    /// Signatures in the order they were added.
    pub signatures: Vec<Signature>,
    /// Content-address assertion, if the path is content addressed.
    pub ca: Option<String>,
}

impl NarInfo {
    /// Describe an uncompressed NAR stored next to its narinfo.
    pub fn new(store_path: StorePath, nar_hash: NarHash, nar_size: u64) -> Self {
        let url = format!("nar/{}.nar", store_path.hash());
        Self {
            store_path,
            url,
            compression: "none".to_string(),
            file_hash: Some(nar_hash.clone()),
            file_size: Some(nar_size),
            nar_hash,
            nar_size,
            references: Vec::new(),
            deriver: None,
            system: None,
            signatures: Vec::new(),
            ca: None,
        }
    }

    pub fn add_signature(&mut self, signature: Signature) {
        self.signatures.push(signature);
    }

    /// Render in the line-oriented format Nix reads, using Nix's field order.
    pub fn to_narinfo_text(&self) -> String {
        let mut out = String::new();
        let mut field = |key: &str, value: &dyn fmt::Display| {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(&value.to_string());
            out.push('\n');
        };

        field("StorePath", &self.store_path);
        field("URL", &self.url);
        field("Compression", &self.compression);
        if let Some(file_hash) = &self.file_hash {
            field("FileHash", file_hash);
        }
        if let Some(file_size) = self.file_size {
            field("FileSize", &file_size);
        }
        field("NarHash", &self.nar_hash);
        field("NarSize", &self.nar_size);

        let refs: Vec<_> = self.references.iter().map(StorePath::basename).collect();
        field("References", &refs.join(" "));

        if let Some(deriver) = &self.deriver {
            field("Deriver", &deriver.basename());
        }
        if let Some(system) = &self.system {
            field("System", system);
        }
        for sig in &self.signatures {
            field("Sig", sig);
        }
        if let Some(ca) = &self.ca {
            field("CA", ca);
        }

        out
    }

    /// Parse narinfo text. Unknown keys are ignored.
    pub fn parse(text: &str) -> crate::Result<Self> {
        let mut store_path = None;
        let mut url = None;
        let mut compression = None;
        let mut file_hash = None;
        let mut file_size = None;
        let mut nar_hash = None;
        let mut nar_size = None;
        let mut references = Vec::new();
        let mut deriver = None;
        let mut system = None;
        let mut signatures = Vec::new();
        let mut ca = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| crate::Error::NarInfoParse(format!("invalid line: {line}")))?;
            let value = value.trim();

            match key {
                "StorePath" => store_path = Some(StorePath::parse(value)?),
                "URL" => url = Some(value.to_string()),
                "Compression" => compression = Some(value.to_string()),
                "FileHash" => file_hash = Some(NarHash::parse(value)?),
                "FileSize" => file_size = Some(parse_size("FileSize", value)?),
                "NarHash" => nar_hash = Some(NarHash::parse(value)?),
                "NarSize" => nar_size = Some(parse_size("NarSize", value)?),
                "References" => {
                    for r in value.split_whitespace() {
                        references.push(StorePath::from_basename(r).map_err(|e| {
                            crate::Error::NarInfoParse(format!("invalid reference '{r}': {e}"))
                        })?);
                    }
                }
                "Deriver" if value != UNKNOWN_DERIVER => {
                    deriver = Some(StorePath::from_basename(value).map_err(|e| {
                        crate::Error::NarInfoParse(format!("invalid deriver '{value}': {e}"))
                    })?);
                }
                "System" => system = Some(value.to_string()),
                "Sig" => signatures.push(Signature::parse(value)?),
                "CA" => ca = Some(value.to_string()),
                _ => {}
            }
        }

        let missing = |field: &str| crate::Error::NarInfoParse(format!("missing {field}"));
        Ok(Self {
            store_path: store_path.ok_or_else(|| missing("StorePath"))?,
            url: url.ok_or_else(|| missing("URL"))?,
            compression: compression.unwrap_or_else(|| "bzip2".to_string()),
            file_hash,
            file_size,
            nar_hash: nar_hash.ok_or_else(|| missing("NarHash"))?,
            nar_size: nar_size.ok_or_else(|| missing("NarSize"))?,
            references,
            deriver,
            system,
            signatures,
            ca,
        })
    }

    /// The byte string a cache key signs.
    ///
    /// `1;<store path>;sha256:<nix32 nar hash>;<nar size>;<sorted full reference paths>`.
    /// Nix only verifies signatures over the nix32 spelling of the hash.
    pub fn fingerprint(&self) -> String {
        let mut refs: Vec<_> = self.references.iter().map(StorePath::to_path_string).collect();
        refs.sort();
        format!(
            "1;{};{};{};{}",
            self.store_path,
            self.nar_hash.to_nix_string(),
            self.nar_size,
            refs.join(",")
        )
    }
}

fn parse_size(field: &str, value: &str) -> crate::Result<u64> {
    value
        .parse()
        .map_err(|e| crate::Error::NarInfoParse(format!("invalid {field}: {e}")))
}

/// One `Sig:` line of a narinfo.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Key name (e.g., "cache.example.com-1").
    pub key_name: String,
    /// Base64-encoded Ed25519 signature.
    pub signature: String,
}

impl Signature {
    pub fn new(key_name: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            key_name: key_name.into(),
            signature: signature.into(),
        }
    }

    /// Parse from "keyname:signature" format.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s.split_once(':') {
            Some((key_name, signature)) if !key_name.is_empty() && !signature.is_empty() => {
                Ok(Self::new(key_name, signature))
            }
            _ => Err(crate::Error::NarInfoParse(format!(
                "invalid signature format: {s}"
            ))),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key_name, self.signature)
    }
}
