//! Registry packages.

use serde::{Deserialize, Serialize};

/// Where a package lives in the store and how to run it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NixMetadata {
    /// Full store path of the single build output.
    pub store_path: String,
    /// Name of the program under `bin/` that launches the package.
    pub main_bin: String,
}

/// An entry in the package registry. Entries are only ever appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub nix_metadata: NixMetadata,
}

impl Package {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        store_path: impl Into<String>,
        main_bin: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            nix_metadata: NixMetadata {
                store_path: store_path.into(),
                main_bin: main_bin.into(),
            },
        }
    }

    /// Check the invariants a package must satisfy before it is registered.
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::InvalidPackage(
                "name must not be empty".to_string(),
            ));
        }
        if self.nix_metadata.main_bin.trim().is_empty() {
            return Err(crate::Error::InvalidPackage(format!(
                "package {} has no main program",
                self.name
            )));
        }
        Ok(())
    }
}
