//! Meshix client.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use meshix_cli::config::{ClientConfig, client_config_path, load_client_config};
use meshix_cli::orchestrator::all_flake_packages;
use meshix_cli::watcher::DEFAULT_STORE_DIR;
use meshix_cli::{
    BuildOverrides, GrpcRegistry, Nix, NixCopyUploader, Orchestrator, PackageRegistry,
    spawn_store_sync,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "meshix")]
#[command(about = "Build, publish and register Nix packages")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct GlobalArgs {
    /// Client config file path
    #[arg(long, global = true, env = "MESHIX_CLIENT_CONFIG")]
    client_config: Option<PathBuf>,

    /// The nix executable to run
    #[arg(long, global = true, env = "MESHIX_NIX")]
    nix: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build packages, push them to a cache and register them
    Build(BuildArgs),
    /// Upload every store path that finishes building until interrupted
    Watch {
        /// Nix store URL to upload to
        #[arg(long, env = "MESHIX_CACHE")]
        cache: Option<String>,

        #[command(flatten)]
        store: StoreArgs,
    },
    /// List registered packages
    List {
        /// Registry gRPC endpoint
        #[arg(long, env = "MESHIX_HUB_URL")]
        hub_url: Option<String>,
    },
}

#[derive(Args, Clone)]
struct BuildArgs {
    /// Installables to build, e.g. `.#hello`
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    exprs: Vec<String>,

    /// Build every package the flake exposes for this system
    #[arg(long)]
    all: bool,

    /// Registry gRPC endpoint
    #[arg(long, env = "MESHIX_HUB_URL")]
    hub_url: Option<String>,

    /// Nix store URL to push builds to
    #[arg(long, env = "MESHIX_CACHE")]
    cache: Option<String>,

    /// Also upload every store path completed during the build
    #[arg(long)]
    watch: bool,

    /// Override the package name
    #[arg(long = "o-name")]
    name: Option<String>,

    /// Override the package version
    #[arg(long = "o-version")]
    version: Option<String>,

    /// Override the main program
    #[arg(long = "o-main-bin")]
    main_bin: Option<String>,

    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args, Clone)]
struct StoreArgs {
    /// Store directory to watch
    #[arg(long = "store")]
    store_dir: Option<PathBuf>,
}

impl StoreArgs {
    fn resolve(&self, config: &ClientConfig) -> PathBuf {
        self.store_dir
            .clone()
            .or_else(|| config.store_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let Cli { global, command } = Cli::parse();
    let config_path = client_config_path(global.client_config.as_deref());
    let config = load_client_config(config_path.as_deref())?;
    let nix = Nix::new(
        global
            .nix
            .or_else(|| config.nix.clone())
            .unwrap_or_else(|| meshix_cli::nix::DEFAULT_NIX_PROGRAM.to_string()),
    );

    match command {
        Commands::Build(args) => handle_build_command(args, nix, &config).await,
        Commands::Watch { cache, store } => {
            let cache = cache
                .or_else(|| config.cache.clone())
                .context("--cache is required to upload store paths")?;
            handle_watch_command(nix, cache, store.resolve(&config)).await
        }
        Commands::List { hub_url } => {
            let hub_url = hub_url
                .or_else(|| config.hub_url.clone())
                .context("--hub-url is required to list packages")?;
            handle_list_command(&hub_url).await
        }
    }
}

async fn handle_build_command(args: BuildArgs, nix: Nix, config: &ClientConfig) -> Result<()> {
    let cache = args.cache.or_else(|| config.cache.clone());
    let hub_url = args.hub_url.or_else(|| config.hub_url.clone());

    let exprs = if args.all {
        all_flake_packages(&nix)
            .await
            .context("failed to list flake packages")?
    } else {
        args.exprs
    };

    let mut orchestrator = Orchestrator::new(nix.clone()).with_overrides(BuildOverrides {
        name: args.name,
        version: args.version,
        main_bin: args.main_bin,
    });
    if let Some(cache) = &cache {
        orchestrator = orchestrator.with_cache(cache.clone());
    }
    match &hub_url {
        Some(url) => {
            let registry = GrpcRegistry::new(url.clone())?;
            orchestrator = orchestrator.with_registry(Arc::new(registry));
        }
        None => tracing::warn!("no --hub-url set; packages will not be registered"),
    }

    let cancel = CancellationToken::new();
    let sync = if args.watch {
        let cache = cache
            .clone()
            .context("--watch requires --cache to upload store paths")?;
        let uploader = NixCopyUploader::new(nix, cache);
        Some(spawn_store_sync(
            &args.store.resolve(config),
            uploader,
            cancel.clone(),
        )?)
    } else {
        None
    };

    let result = Arc::new(orchestrator).build_all(exprs).await;

    cancel.cancel();
    if let Some(sync) = sync {
        sync.await.context("store sync task failed")?;
    }

    let packages = result?;
    for package in &packages {
        println!(
            "{} {} {}",
            package.name, package.version, package.nix_metadata.store_path
        );
    }
    Ok(())
}

async fn handle_watch_command(nix: Nix, cache: String, store_dir: PathBuf) -> Result<()> {
    let cancel = CancellationToken::new();
    let sync = spawn_store_sync(&store_dir, NixCopyUploader::new(nix, cache), cancel.clone())?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("interrupted, stopping store watcher");
    cancel.cancel();

    let stats = sync.await.context("store sync task failed")?;
    println!("{} uploaded, {} failed", stats.uploaded, stats.failed);
    Ok(())
}

async fn handle_list_command(hub_url: &str) -> Result<()> {
    let registry = GrpcRegistry::new(hub_url)?;
    let packages = registry.list_packages().await?;
    if packages.is_empty() {
        println!("No packages registered.");
        return Ok(());
    }
    for package in packages {
        println!(
            "{}\t{}\t{}\t{}",
            package.name,
            package.version,
            package.nix_metadata.main_bin,
            package.nix_metadata.store_path
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_build_requires_expression_or_all() {
        assert!(Cli::try_parse_from(["meshix", "build"]).is_err());
        assert!(Cli::try_parse_from(["meshix", "build", "--all", ".#hello"]).is_err());

        let cli = Cli::try_parse_from(["meshix", "build", "--all"]).unwrap();
        assert!(matches!(cli.command, Commands::Build(ref args) if args.all));
    }

    #[test]
    fn test_build_overrides_parse() {
        let cli = Cli::try_parse_from([
            "meshix",
            "build",
            ".#hello",
            ".#cowsay",
            "--o-version",
            "9.9.9",
            "--o-main-bin",
            "hi",
            "--hub-url",
            "http://localhost:8088",
        ])
        .unwrap();
        let Commands::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.exprs, [".#hello", ".#cowsay"]);
        assert_eq!(args.version.as_deref(), Some("9.9.9"));
        assert_eq!(args.main_bin.as_deref(), Some("hi"));
        assert_eq!(args.hub_url.as_deref(), Some("http://localhost:8088"));
    }

    #[test]
    fn test_store_dir_resolution() {
        let args = StoreArgs { store_dir: None };
        assert_eq!(
            args.resolve(&ClientConfig::default()),
            PathBuf::from("/nix/store")
        );

        let config = ClientConfig {
            store_dir: Some(PathBuf::from("/tmp/store")),
            ..Default::default()
        };
        assert_eq!(args.resolve(&config), PathBuf::from("/tmp/store"));

        let args = StoreArgs {
            store_dir: Some(PathBuf::from("/other")),
        };
        assert_eq!(args.resolve(&config), PathBuf::from("/other"));
    }
}
