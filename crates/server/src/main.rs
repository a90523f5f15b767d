//! Meshix server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use meshix_core::config::{AppConfig, SigningConfig};
use meshix_server::{AppState, create_app};
use meshix_signer::NarInfoSigner;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Meshix - Nix binary cache and package registry
#[derive(Parser, Debug)]
#[command(name = "meshixd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "MESHIX_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,

    /// Address and port to listen on
    #[arg(long)]
    listen: Option<String>,

    /// Binary cache secret key (`name:base64`)
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Path to the binary cache secret key
    #[arg(long, env = "SECRET_KEY_FILE_PATH")]
    secret_key_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Meshix v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args)?;
    let signing = config
        .signing
        .as_ref()
        .context("one of --secret-key or --secret-key-file has to be set")?;
    let signer = load_signer(signing).await?;
    tracing::info!(public_key = %signer.nix_public_key(), "cache signing key loaded");

    let storage = meshix_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    storage
        .health_check(&config.cache.bucket)
        .await
        .context("storage health check failed")?;
    tracing::info!(
        backend = storage.backend_name(),
        bucket = %config.cache.bucket,
        "storage backend ready"
    );

    let registry = meshix_registry::from_config(&config.registry)
        .await
        .context("failed to initialize package registry")?;
    registry
        .health_check()
        .await
        .context("registry health check failed")?;

    let addr: SocketAddr = config
        .server
        .listen
        .parse()
        .context("invalid listen address")?;

    let state = AppState::new(config, storage, registry, signer);
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Merge the config file, `MESHIX_` env vars and command-line flags, in that order.
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if std::path::Path::new(&args.config).exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let mut config: AppConfig = figment
        .merge(Env::prefixed("MESHIX_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    if let Some(listen) = &args.listen {
        config.server.listen = listen.clone();
    }
    // a key file beats an inline key
    if let Some(path) = &args.secret_key_file {
        config.signing = Some(SigningConfig::File { path: path.clone() });
    } else if let Some(key) = &args.secret_key {
        config.signing = Some(SigningConfig::Value { key: key.clone() });
    }

    Ok(config)
}

/// Load the narinfo signer from configuration.
async fn load_signer(config: &SigningConfig) -> Result<NarInfoSigner> {
    let key_data = match config {
        SigningConfig::File { path } => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read key file: {}", path.display()))?,
        SigningConfig::Env { var } => {
            std::env::var(var).with_context(|| format!("signing key env var not set: {var}"))?
        }
        SigningConfig::Value { key } => key.clone(),
    };

    let signer = NarInfoSigner::from_nix_secret_key(key_data.trim())
        .context("failed to parse signing key")?;
    tracing::info!("Loaded signing key: {}", signer.key_name());
    Ok(signer)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args(config: &std::path::Path) -> Args {
        Args {
            config: config.display().to_string(),
            listen: None,
            secret_key: None,
            secret_key_file: None,
        }
    }

    #[tokio::test]
    async fn load_signer_from_env() {
        let signer = NarInfoSigner::generate("test-cache-1");
        // SAFETY: the variable name is unique to this test
        unsafe { std::env::set_var("MESHIXD_TEST_SIGNING_KEY", signer.nix_secret_key()) };

        let config = SigningConfig::Env {
            var: "MESHIXD_TEST_SIGNING_KEY".to_string(),
        };
        let loaded = load_signer(&config).await.unwrap();
        assert_eq!(loaded.nix_public_key(), signer.nix_public_key());

        // SAFETY: as above
        unsafe { std::env::remove_var("MESHIXD_TEST_SIGNING_KEY") };
    }

    #[tokio::test]
    async fn load_signer_from_file_trims_newline() {
        let signer = NarInfoSigner::generate("test-cache-1");
        let temp = tempdir().unwrap();
        let key_path = temp.path().join("cache.sec");
        tokio::fs::write(&key_path, format!("{}\n", signer.nix_secret_key()))
            .await
            .unwrap();

        let loaded = load_signer(&SigningConfig::File { path: key_path })
            .await
            .unwrap();
        assert_eq!(loaded.key_name(), "test-cache-1");
    }

    #[tokio::test]
    async fn load_signer_rejects_garbage() {
        let config = SigningConfig::Value {
            key: "not-a-key".to_string(),
        };
        assert!(load_signer(&config).await.is_err());
    }

    #[test]
    fn load_config_reads_file_and_flags_win() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("server.toml");
        std::fs::write(
            &path,
            r#"
[server]
listen = "127.0.0.1:9000"

[cache]
bucket = "binaries"

[signing]
type = "value"
key = "from-file"
"#,
        )
        .unwrap();

        let config = load_config(&args(&path)).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9000");
        assert_eq!(config.cache.bucket, "binaries");
        assert!(matches!(
            config.signing,
            Some(SigningConfig::Value { ref key }) if key == "from-file"
        ));

        let mut overridden = args(&path);
        overridden.listen = Some("0.0.0.0:1234".to_string());
        overridden.secret_key = Some("inline".to_string());
        overridden.secret_key_file = Some(PathBuf::from("/run/keys/cache.sec"));
        let config = load_config(&overridden).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:1234");
        assert!(matches!(config.signing, Some(SigningConfig::File { .. })));
    }

    #[test]
    fn load_config_without_file_uses_defaults() {
        let temp = tempdir().unwrap();
        let config = load_config(&args(&temp.path().join("missing.toml"))).unwrap();
        assert_eq!(config.cache.bucket, "nix");
        assert!(config.signing.is_none());
    }
}
