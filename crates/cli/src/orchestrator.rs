//! Build orchestration: evaluate, build, push and register packages.
//!
//! Every expression runs as its own task. The run succeeds only if every
//! task does; the first failure is returned while the remaining tasks are
//! left to finish on their own.

use crate::error::{BuildError, BuildResult};
use crate::nix::{BuildOutput, Nix, current_system};
use crate::registry::PackageRegistry;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use meshix_core::Package;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Values that replace what evaluation reports.
#[derive(Debug, Clone, Default)]
pub struct BuildOverrides {
    pub name: Option<String>,
    pub version: Option<String>,
    pub main_bin: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// The one store path a build produced, across every result it reported.
pub fn single_output(expr: &str, results: &[BuildOutput]) -> BuildResult<String> {
    let mut outputs = results.iter().flat_map(|r| r.outputs.values());
    match (outputs.next(), outputs.next()) {
        (Some(path), None) => Ok(path.clone()),
        _ => Err(BuildError::UnsupportedOutputs {
            expr: expr.to_string(),
            count: results.iter().map(|r| r.outputs.len()).sum(),
        }),
    }
}

/// `packages.<system>.<name>` installables for the flake in the working directory.
pub async fn all_flake_packages(nix: &Nix) -> BuildResult<Vec<String>> {
    let system = current_system();
    let names = nix.flake_packages(&system).await?;
    if names.is_empty() {
        warn!(%system, "flake exposes no packages for this system");
    }
    Ok(names
        .into_iter()
        .map(|name| format!(".#packages.{system}.{name}"))
        .collect())
}

pub struct Orchestrator {
    nix: Nix,
    cache: Option<String>,
    registry: Option<Arc<dyn PackageRegistry>>,
    overrides: BuildOverrides,
}

impl Orchestrator {
    pub fn new(nix: Nix) -> Self {
        Self {
            nix,
            cache: None,
            registry: None,
            overrides: BuildOverrides::default(),
        }
    }

    /// Push every build to this cache.
    pub fn with_cache(mut self, cache: impl Into<String>) -> Self {
        self.cache = Some(cache.into());
        self
    }

    /// Register every build here.
    pub fn with_registry(mut self, registry: Arc<dyn PackageRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_overrides(mut self, overrides: BuildOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Build one expression end to end and return what was registered.
    #[instrument(skip(self))]
    pub async fn build_one(&self, expr: &str) -> BuildResult<Package> {
        let meta = self.nix.eval_meta(expr).await?;
        if meta.main_program.trim().is_empty() {
            return Err(BuildError::MissingMainProgram {
                expr: expr.to_string(),
            });
        }
        let main_bin = non_empty(&self.overrides.main_bin)
            .map(str::to_string)
            .unwrap_or_else(|| meta.main_program.clone());

        let results = self.nix.build(expr).await?;
        let store_path = single_output(expr, &results)?;
        info!(%store_path, "built");

        if let Some(cache) = &self.cache {
            self.nix.push(cache, expr).await?;
            info!(%cache, "pushed");
        }

        let version = match non_empty(&self.overrides.version) {
            Some(version) => version.to_string(),
            None => self.nix.eval_version(expr).await?,
        };
        let name = non_empty(&self.overrides.name)
            .map(str::to_string)
            .unwrap_or(meta.name);

        let package = Package::new(name, version, store_path, main_bin);
        if let Some(registry) = &self.registry {
            registry.push_package(&package).await?;
            info!(name = %package.name, version = %package.version, "registered");
        }
        Ok(package)
    }

    /// Build every expression concurrently. Fails with the first error reported.
    pub async fn build_all(self: Arc<Self>, exprs: Vec<String>) -> BuildResult<Vec<Package>> {
        let mut tasks: FuturesUnordered<_> = exprs
            .into_iter()
            .map(|expr| {
                let this = Arc::clone(&self);
                tokio::spawn(async move { this.build_one(&expr).await })
            })
            .collect();

        let mut built = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.next().await {
            built.push(joined??);
        }
        Ok(built)
    }
}
