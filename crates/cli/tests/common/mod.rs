//! Shared helpers for client tests.
//! Note: #[allow(dead_code)] because each test file compiles common/ separately.
#![allow(dead_code)]

use async_trait::async_trait;
use meshix_cli::{Nix, PackageRegistry, RegistryError};
use meshix_core::Package;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

pub const HELLO_STORE_PATH: &str = "/nix/store/0c0rl4ilgzjg7gm8jpyh2fswdlxnpd2y-hello-2.12.1";

const SCRIPT: &str = r#"#!/bin/sh
dir='@DIR@'
echo "$*" >> "$dir/invocations.log"
case "$1" in
eval)
  case "$*" in
  *.meta) file=meta.json ;;
  *.version) file=version.json ;;
  *) exit 1 ;;
  esac ;;
build) file=build.json ;;
copy) file=copy ;;
flake) file=flake.json ;;
*) exit 1 ;;
esac
if [ -f "$dir/$file.fail" ]; then
  echo "fake nix: $1 failed" >&2
  exit 1
fi
if [ -f "$dir/$file" ]; then
  cat "$dir/$file"
fi
"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// A stand-in `nix` executable answering from files in a temp directory.
///
/// Every invocation is appended to `invocations.log`. By default it
/// describes a single-output `hello` package.
pub struct FakeNix {
    dir: TempDir,
    program: PathBuf,
}

impl FakeNix {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let body = SCRIPT.replace("@DIR@", &dir.path().display().to_string());
        let program = write_script(dir.path(), "nix", &body);

        let fake = Self { dir, program };
        fake.respond("meta.json", r#"{"name":"hello-2.12.1","mainProgram":"hello"}"#);
        fake.respond("version.json", r#""2.12.1""#);
        fake.respond(
            "build.json",
            &format!(
                r#"[{{"drvPath":"/nix/store/k9vd7j2k0x0y3kxcmcwbg0gbw3a3n1qy-hello-2.12.1.drv","outputs":{{"out":"{HELLO_STORE_PATH}"}}}}]"#
            ),
        );
        fake
    }

    pub fn respond(&self, file: &str, body: &str) {
        std::fs::write(self.dir.path().join(file), body).unwrap();
    }

    /// Make the subcommand answering from `file` exit non-zero.
    pub fn fail(&self, file: &str) {
        std::fs::write(self.dir.path().join(format!("{file}.fail")), "").unwrap();
    }

    pub fn nix(&self) -> Nix {
        Nix::new(&self.program)
    }

    pub fn invocations(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("invocations.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// First word of every invocation, e.g. `eval`, `build`, `copy`.
    pub fn subcommands(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .filter_map(|line| line.split_whitespace().next().map(str::to_string))
            .collect()
    }
}

/// Registry that keeps pushed packages in memory.
#[derive(Default)]
pub struct RecordingRegistry {
    pub packages: Mutex<Vec<Package>>,
}

impl RecordingRegistry {
    pub fn pushed(&self) -> Vec<Package> {
        self.packages.lock().unwrap().clone()
    }
}

#[async_trait]
impl PackageRegistry for RecordingRegistry {
    async fn push_package(&self, package: &Package) -> Result<(), RegistryError> {
        self.packages.lock().unwrap().push(package.clone());
        Ok(())
    }

    async fn list_packages(&self) -> Result<Vec<Package>, RegistryError> {
        Ok(self.pushed())
    }
}
