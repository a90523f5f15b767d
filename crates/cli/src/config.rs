//! Client configuration file.
//!
//! Command-line flags and their environment variables win over the file.

use anyhow::Result;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Registry gRPC endpoint, e.g. `http://localhost:8088`.
    pub hub_url: Option<String>,
    /// Nix store URL builds are copied to.
    pub cache: Option<String>,
    /// The `nix` executable to run.
    pub nix: Option<String>,
    /// Store directory the watcher subscribes to.
    pub store_dir: Option<PathBuf>,
}

/// Resolve the client config path: explicit path, then `$XDG_CONFIG_HOME`, then `~/.config`.
pub fn client_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from(std::env::var_os("HOME")?).join(".config"),
    };
    Some(base.join("meshix").join("client.toml"))
}

/// Load the client config. A missing file yields the defaults.
pub fn load_client_config(path: Option<&Path>) -> Result<ClientConfig> {
    let mut figment = Figment::new();
    if let Some(path) = path.filter(|p| p.exists()) {
        figment = figment.merge(Toml::file(path));
    }
    figment = figment.merge(Env::prefixed("MESHIX_").only(&["hub_url", "cache", "nix"]));

    figment
        .extract()
        .map_err(|err| anyhow::anyhow!(err).context("failed to load client configuration"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let path = client_config_path(Some(Path::new("/tmp/meshix.toml")));
        assert_eq!(path, Some(PathBuf::from("/tmp/meshix.toml")));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(
            &path,
            "hub_url = \"http://hub:8088\"\ncache = \"s3://nix?endpoint=minio:9000\"\nstore_dir = \"/tmp/store\"\n",
        )
        .unwrap();

        let config = load_client_config(Some(&path)).unwrap();
        assert_eq!(config.store_dir, Some(PathBuf::from("/tmp/store")));
        // environment may override these in CI, so only check the file-only field strictly
        if std::env::var_os("MESHIX_HUB_URL").is_none() {
            assert_eq!(config.hub_url.as_deref(), Some("http://hub:8088"));
        }
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_client_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.store_dir, None);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "hub_url = [").unwrap();
        assert!(load_client_config(Some(&path)).is_err());
    }
}
