//! Thin async wrapper around the `nix` command line.

use crate::error::{BuildError, BuildResult};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

pub const DEFAULT_NIX_PROGRAM: &str = "nix";

/// The subset of `meta` the client reads.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PackageMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub main_program: String,
}

/// One element of `nix build --json` output.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutput {
    pub drv_path: String,
    /// Output label (`out`, `dev`, ...) to store path.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct FlakeShow {
    #[serde(default)]
    packages: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

/// Append an attribute to a flake installable.
///
/// A bare flake reference ending in `#` selects its `default` package.
pub fn attribute(expr: &str, attr: &str) -> String {
    if expr.ends_with('#') {
        format!("{expr}default.{attr}")
    } else {
        format!("{expr}.{attr}")
    }
}

/// Nix system double of the running host, e.g. `x86_64-linux` or `aarch64-darwin`.
pub fn current_system() -> String {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    format!("{}-{os}", std::env::consts::ARCH)
}

/// Runs `nix` subcommands. Progress output goes straight to the terminal.
#[derive(Debug, Clone)]
pub struct Nix {
    program: OsString,
}

impl Default for Nix {
    fn default() -> Self {
        Self::new(DEFAULT_NIX_PROGRAM)
    }
}

impl Nix {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub async fn eval_meta(&self, expr: &str) -> BuildResult<PackageMeta> {
        let attr = attribute(expr, "meta");
        self.json(&["eval", "--json", "--quiet", attr.as_str()]).await
    }

    pub async fn eval_version(&self, expr: &str) -> BuildResult<String> {
        let attr = attribute(expr, "version");
        self.json(&["eval", "--quiet", "--json", attr.as_str()]).await
    }

    pub async fn build(&self, expr: &str) -> BuildResult<Vec<BuildOutput>> {
        self.json(&["build", "--quiet", "--json", expr]).await
    }

    /// Copy a build expression's closure to a cache.
    pub async fn push(&self, cache: &str, expr: &str) -> BuildResult<()> {
        self.output(&["copy", "--quiet", "--to", cache, expr])
            .await
            .map(drop)
    }

    /// Copy a single store path to a cache.
    pub async fn copy_path(&self, cache: &str, path: &str) -> BuildResult<()> {
        self.output(&["copy", "--to", cache, path]).await.map(drop)
    }

    /// Attribute names under `packages.<system>` of the flake in the working directory.
    ///
    /// Empty when the flake exposes nothing for `system`.
    pub async fn flake_packages(&self, system: &str) -> BuildResult<Vec<String>> {
        let mut show: FlakeShow = self.json(&["flake", "show", "--quiet", "--json"]).await?;
        Ok(show
            .packages
            .remove(system)
            .map(|packages| packages.into_keys().collect())
            .unwrap_or_default())
    }

    async fn json<T: DeserializeOwned>(&self, args: &[&str]) -> BuildResult<T> {
        let stdout = self.output(args).await?;
        serde_json::from_slice(&stdout).map_err(|source| BuildError::Decode {
            command: args.join(" "),
            source,
        })
    }

    async fn output(&self, args: &[&str]) -> BuildResult<Vec<u8>> {
        debug!(program = ?self.program, ?args, "running nix");
        let spawn_error = |source| BuildError::Spawn {
            program: self.program.to_string_lossy().into_owned(),
            source,
        };

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(spawn_error)?;
        let output = child.wait_with_output().await.map_err(spawn_error)?;

        if !output.status.success() {
            return Err(BuildError::NixFailed {
                command: args.join(" "),
                status: output.status,
            });
        }
        Ok(output.stdout)
    }
}
