use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bridge_history::api::{self, AppState};
use bridge_history::chain::{ArbitrumMessageReader, EvmRpc};
use bridge_history::config::Config;
use bridge_history::error::{HistoryError, Result};
use bridge_history::history::HistoryEngine;
use bridge_history::indexer::HttpIndexerTransport;
use bridge_history::live::LiveMergeRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting bridge history v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Page size: {}", config.page_size);
    tracing::info!("Resolution concurrency: {}", config.resolution_concurrency);

    let l1 = Arc::new(EvmRpc::new("L1", &config.l1_rpc_url, config.rpc_requests_per_second)?);
    let l2 = Arc::new(EvmRpc::new("L2", &config.l2_rpc_url, config.rpc_requests_per_second)?);
    let messages = Arc::new(ArbitrumMessageReader::new(l2.clone()));
    let transport = Arc::new(HttpIndexerTransport::new(
        config.l1_indexer_url.clone(),
        config.l2_indexer_url.clone(),
        config.indexer_requests_per_second,
    ));

    let engine = Arc::new(HistoryEngine::new(
        transport,
        l1,
        l2,
        messages,
        Arc::new(LiveMergeRegistry::new()),
        config.history_settings(),
    ));

    let chains = engine.chain_ids().await?;
    tracing::info!("Chains: L1 {} / L2 {}", chains.l1, chains.l2);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| HistoryError::Config(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("API server listening on {}", addr);

    let router = api::create_router(AppState::new(engine, config, chains));

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
