mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use pinhole_core::Repository;
use pinhole_gateway::{App, AppState};
use pinhole_shortener::ShortenerService;
use pinhole_storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{LogFormatArg, CLI};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(config.log_format);

    let storage_config = config.storage_config();
    info!(
        listen_addr = %config.listen_addr,
        base_url = %config.base_url,
        storage_backend = %storage_config.backend_kind(),
        "starting gateway server"
    );

    let storage = Arc::new(
        Storage::from_config(&storage_config)
            .await
            .context("failed to initialise storage")?,
    );
    let shortener = ShortenerService::new(Arc::clone(&storage));
    let state = AppState::new(Arc::new(shortener), config.base_url.clone())
        .with_ping_timeout(config.ping_timeout());

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(listen_addr = %listener.local_addr()?, "listening");

    axum::serve(listener, App::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    storage.close().await.context("failed to close storage")?;
    info!("gateway stopped");
    Ok(())
}

fn init_tracing(format: LogFormatArg) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormatArg::Text => builder.init(),
        LogFormatArg::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
