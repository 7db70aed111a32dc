use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use flatfile_server::{app, telemetry::setup_tracing, AppState, ServerConfig};
use flatfile_storage::ObjectStoreGateway;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "flatfile-server", about = "REST API over CSV transaction files in an object store")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(path) => ServerConfig::from_path(&path)?,
        None => ServerConfig::default(),
    };
    config.apply_env();

    setup_tracing(config.log_format)?;

    let gateway = ObjectStoreGateway::from_config(&config.store).context("Failed to create object store gateway")?;
    let state = AppState::new(Arc::new(gateway));
    let router = app(state, &config);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!(
        addr = %config.listen_addr,
        backend = ?config.store.backend,
        bucket = %config.store.bucket,
        "flatfile-server listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
