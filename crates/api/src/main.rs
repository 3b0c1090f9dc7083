//! Innkeeper resilience service
//!
//! Usage: `innkeeper [CONFIG_PATH]`. Without a path the configuration is
//! taken from `INNKEEPER_CONFIG` or the standard locations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use innkeeper_api::{router, AppContext};
use innkeeper_infra::config;
use innkeeper_infra::observability::init_tracing;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = config::load(config_path).context("failed to load configuration")?;
    init_tracing(&config.logging).context("failed to initialise tracing")?;

    let context =
        Arc::new(AppContext::new(config).await.context("failed to build application context")?);
    context.run_startup_checks().await.context("startup dependency checks failed")?;
    context.start_background().await.context("failed to start background schedulers")?;

    let bind_address = context.config.server.bind_address.clone();
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!(address = %bind_address, "Admin API listening");

    let served = axum::serve(listener, router(Arc::clone(&context)))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    context.shutdown().await;
    served.context("admin server failed")?;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("Shutdown signal received");
}
