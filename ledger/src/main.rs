// src/main.rs
//
// Minimal demo node that wires up the ledger library:
//
// - Append-only file-backed ledger storage, replayed on startup
// - Ed25519-signed messages with a fixed demo identity
// - Proof-of-work miner threads racing block ingestion
// - Prometheus metrics exporter on /metrics
// - Simple loop that signs and ingests one demo message per tick.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tokio::signal;

use ledger::{
    // Domain types
    Block,
    // Key service
    Ed25519KeyRing,
    // Storage backend
    FileLedger,
    // Engine + miner
    LedgerEngine,
    // Metrics
    MetricsRegistry,
    Miner,
    // Top-level config
    NodeConfig,
    run_prometheus_http_server,
};

#[tokio::main]
async fn main() {
    // Basic tracing setup.
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "ledger=info".to_string()))
        .init();

    if let Err(err) = run_node().await {
        eprintln!("fatal error: {err}");
        std::process::exit(1);
    }
}

async fn run_node() -> Result<(), String> {
    // For now, just use defaults. Later you can load from a file/CLI/env.
    let cfg = NodeConfig::default();

    // ---------------------------
    // Metrics registry + exporter
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                eprintln!("metrics HTTP server error: {e}");
            }
        });
        eprintln!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Storage backend (ledger file)
    // ---------------------------

    let store = FileLedger::open(&cfg.storage).map_err(|e| {
        format!(
            "failed to open ledger file at {}: {e}",
            cfg.storage.path
        )
    })?;

    // ---------------------------
    // Node identity (demo)
    // ---------------------------

    // A fixed seed keeps the demo identity stable across restarts, so
    // replayed blocks stay attributed to this node. The signer is a second
    // ring over the same seed because the engine takes ownership of its own.
    let seed = *b"ledger-demo-node-signing-seed-01";
    let signer = Ed25519KeyRing::from_seed(seed);

    // ---------------------------
    // Engine + replay
    // ---------------------------

    let engine = Arc::new(LedgerEngine::new(
        cfg.chain.clone(),
        Ed25519KeyRing::from_seed(seed),
        store,
    ));

    let replayed = engine
        .load()
        .map_err(|e| format!("failed to replay ledger at {}: {e}", cfg.storage.path))?;

    eprintln!(
        "starting node: {} replayed blocks, difficulty {}, batch size {}",
        replayed, cfg.chain.pow_leading_zeros, cfg.chain.messages_per_block
    );

    // ---------------------------
    // Miner workers
    // ---------------------------

    let mut miner_handles = Vec::new();
    if cfg.mining.enabled {
        for _ in 0..cfg.mining.workers {
            miner_handles.push(Miner::spawn(engine.clone()));
        }
    } else {
        eprintln!("mining disabled; node will only ingest");
    }

    // ---------------------------
    // Demo message loop
    // ---------------------------

    let tick = Duration::from_secs(1);
    let mut seq = 0u64;
    let mut fault = None;

    loop {
        let timestamp = current_unix_timestamp();
        let payload = format!("demo message {seq}").into_bytes();
        let message = signer.sign_message(timestamp, payload, None);

        match engine.ingest_message(&message.encode()) {
            Ok(_) => metrics.chain.messages_accepted.inc(),
            Err(e) => {
                metrics
                    .chain
                    .messages_rejected
                    .with_label_values(&[e.as_str()])
                    .inc();
                tracing::warn!("demo message rejected: {e}");
            }
        }

        if let Some(wire) = engine.take_newly_mined_block() {
            if let Some(block) = Block::decode(&wire) {
                println!(
                    "mined block hash={} messages={}",
                    block.compute_hash().to_hex(),
                    block.messages.len()
                );
            }
        }

        let stats = engine.stats();
        metrics.chain.observe_stats(&stats);
        if seq % 30 == 0 {
            tracing::info!(
                depth = stats.canonical_depth,
                blocks = stats.total_blocks,
                pending = stats.pending_messages,
                mined = stats.mined_blocks,
                "chain status"
            );
        }
        seq += 1;

        // A failed ledger append means the durable log stopped growing; the
        // node must come down rather than keep accepting blocks.
        if let Some(f) = engine.storage_fault() {
            fault = Some(f);
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(tick) => {}
            _ = signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    // ---------------------------
    // Shutdown
    // ---------------------------

    engine.shutdown();
    for handle in miner_handles {
        let _ = handle.join();
    }

    match fault {
        Some(f) => Err(format!("ledger append failed: {f}")),
        None => Ok(()),
    }
}

/// Returns the current wall-clock time as seconds since Unix epoch.
///
/// On error (system clock before epoch) this falls back to 0.
fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}
