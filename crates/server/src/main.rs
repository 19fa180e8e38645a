//! Silo chunk storage node binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use silo_core::config::AppConfig;
use silo_server::{AppState, PrometheusStats, create_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Silo - a chunk storage node
#[derive(Parser, Debug)]
#[command(name = "silod")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "SILO_CONFIG", default_value = "config/silod.toml")]
    config: String,
}

/// Load configuration from the optional file, overridden by `SILO_` env vars.
fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();

    if std::path::Path::new(path).exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("SILO_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
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

    tracing::info!("Silo v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    let backend = silo_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    backend
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(backend = backend.backend_name(), "Storage backend initialized");

    backend
        .lock(&config.server.namespace, config.server.service_url())
        .await
        .context("failed to lock the volume")?;
    tracing::info!(
        namespace = %config.server.namespace,
        url = %config.server.service_url(),
        "Volume locked"
    );

    let stats = Arc::new(PrometheusStats::new().context("failed to register metrics")?);
    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;

    let state = AppState::new(config, backend, stats);
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
