// gateway/src/main.rs

//! Gateway binary.
//!
//! This binary exposes a small HTTP API on top of the `ledger` crate:
//!
//! - `GET /health`
//! - `POST /messages`
//! - `GET /messages/pending`
//! - `POST /blocks`
//! - `GET /blocks?since=<timestamp>`
//! - `GET /blocks/mined`
//! - `GET /blocks/tree.dot`
//!
//! It embeds a `DefaultLedgerEngine` (file-backed, replayed on startup),
//! proof-of-work miner threads racing peer-block ingestion, and a
//! Prometheus metrics exporter on `/metrics`.

mod config;
mod routes;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::signal;

use config::ApiConfig;
use ledger::{
    Ed25519KeyRing, FileLedger, LedgerEngine, MetricsRegistry, Miner, NodeConfig,
    run_prometheus_http_server,
};
use routes::{blocks, health, messages};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    // Basic tracing setup.
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "gateway=info,ledger=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    // For now we use default configs. These can be externalised later.
    let api_cfg = ApiConfig::default();
    let node_cfg = NodeConfig::default();

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    // Metrics exporter.
    if node_cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = node_cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                eprintln!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Storage + ledger engine
    // ---------------------------

    let store = FileLedger::open(&node_cfg.storage).map_err(|e| {
        format!(
            "failed to open ledger file at {}: {e}",
            node_cfg.storage.path
        )
    })?;

    // A fixed seed keeps this node's miner identity stable across restarts,
    // so replayed blocks stay attributed to it.
    let keys = Ed25519KeyRing::from_seed(*b"gateway-node-ed25519-signing-key");

    let engine: Arc<ledger::DefaultLedgerEngine> =
        Arc::new(LedgerEngine::new(node_cfg.chain.clone(), keys, store));

    let replayed = engine
        .load()
        .map_err(|e| format!("failed to replay ledger at {}: {e}", node_cfg.storage.path))?;
    tracing::info!(replayed, "ledger replay complete");

    // ---------------------------
    // Miner workers
    // ---------------------------

    let mut miner_handles = Vec::new();
    if node_cfg.mining.enabled {
        for _ in 0..node_cfg.mining.workers {
            miner_handles.push(Miner::spawn(engine.clone()));
        }
        tracing::info!(workers = miner_handles.len(), "miner workers started");
    }

    // ---------------------------
    // Shared state
    // ---------------------------

    let app_state: SharedState = Arc::new(AppState {
        engine: engine.clone(),
        metrics: metrics.clone(),
    });

    // ---------------------------
    // Stats updater loop
    // ---------------------------

    let stats_state = app_state.clone();
    tokio::spawn(async move {
        run_stats_updater(stats_state).await;
    });

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/messages", post(messages::submit_message))
        .route("/messages/pending", get(messages::pending_messages))
        .route("/blocks", post(blocks::submit_block).get(blocks::list_blocks))
        .route("/blocks/mined", get(blocks::mined_block))
        .route("/blocks/tree.dot", get(blocks::tree_dot))
        .with_state(app_state);

    // ---------------------------
    // axum 0.8 server (hyper 1 / tokio 1.48 style)
    // ---------------------------

    tracing::info!("gateway listening on http://{}", api_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(engine.clone()))
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    // ---------------------------
    // Shutdown
    // ---------------------------

    engine.shutdown();
    for handle in miner_handles {
        let _ = handle.join();
    }

    if let Some(fault) = engine.storage_fault() {
        return Err(format!("ledger append failed: {fault}"));
    }
    Ok(())
}

/// Background stats updater loop.
///
/// Periodically folds the engine's [`ledger::ChainStats`] snapshot into the
/// metrics gauges and logs a one-line chain status.
async fn run_stats_updater(state: SharedState) {
    let interval = std::time::Duration::from_secs(10);
    tracing::info!(
        "stats updater running with interval {}s",
        interval.as_secs()
    );

    loop {
        let stats = state.engine.stats();
        state.metrics.chain.observe_stats(&stats);
        tracing::info!(
            depth = stats.canonical_depth,
            blocks = stats.total_blocks,
            pending = stats.pending_messages,
            mined = stats.mined_blocks,
            reorgs = stats.reorgs,
            "chain status"
        );

        tokio::time::sleep(interval).await;
    }
}

/// Resolves on Ctrl-C or once the engine records a storage fault; either
/// way the server drains and the binary exits through `run`.
async fn shutdown_signal(engine: Arc<ledger::DefaultLedgerEngine>) {
    let storage_fault = async {
        loop {
            if engine.storage_fault().is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    };

    tokio::select! {
        _ = signal::ctrl_c() => tracing::info!("shutdown signal received"),
        _ = storage_fault => tracing::error!("ledger storage fault; shutting down"),
    }
}
