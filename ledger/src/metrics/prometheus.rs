//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed chain metrics, and an async
//! HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::chain::ChainStats;

/// Chain-related Prometheus metrics.
///
/// These are registered into a [`Registry`] and updated from the code
/// that drives the engine: ingestion call sites feed the counters and
/// the latency histogram, and a periodic task folds in a
/// [`ChainStats`] snapshot via [`ChainMetrics::observe_stats`].
#[derive(Clone)]
pub struct ChainMetrics {
    /// Blocks accepted into the tree, local and peer alike.
    pub blocks_accepted: IntCounter,
    /// Rejected blocks, labelled by rejection reason.
    pub blocks_rejected: IntCounterVec,
    /// Messages accepted into the pending queue.
    pub messages_accepted: IntCounter,
    /// Rejected messages, labelled by rejection reason.
    pub messages_rejected: IntCounterVec,
    /// Blocks this node mined itself.
    pub blocks_mined: IntCounter,
    /// Canonical branch switches.
    pub reorgs: IntCounter,
    /// Latency of a full block ingestion (decode to tip update), in seconds.
    pub block_ingest_seconds: Histogram,
    /// Depth of the canonical chain.
    pub canonical_depth: IntGauge,
    /// Depth of the deepest non-canonical branch.
    pub best_fork_depth: IntGauge,
    /// Blocks known to the tree across all branches.
    pub total_blocks: IntGauge,
    /// Blocks outside the canonical path.
    pub stale_blocks: IntGauge,
    /// Distinct branch identifiers in the tree.
    pub fork_count: IntGauge,
    /// Messages waiting in the pending queue.
    pub pending_messages: IntGauge,
}

impl ChainMetrics {
    /// Registers chain metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        // Block acceptance / rejection counters.
        let blocks_accepted = IntCounter::with_opts(Opts::new(
            "blocks_accepted_total",
            "Total number of blocks accepted into the block tree",
        ))?;
        registry.register(Box::new(blocks_accepted.clone()))?;

        let blocks_rejected = IntCounterVec::new(
            Opts::new(
                "blocks_rejected_total",
                "Total number of rejected blocks by rejection reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(blocks_rejected.clone()))?;

        // Message acceptance / rejection counters.
        let messages_accepted = IntCounter::with_opts(Opts::new(
            "messages_accepted_total",
            "Total number of messages accepted into the pending queue",
        ))?;
        registry.register(Box::new(messages_accepted.clone()))?;

        let messages_rejected = IntCounterVec::new(
            Opts::new(
                "messages_rejected_total",
                "Total number of rejected messages by rejection reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(messages_rejected.clone()))?;

        // Mining and reorganisation counters.
        let blocks_mined = IntCounter::with_opts(Opts::new(
            "blocks_mined_total",
            "Total number of blocks mined by this node",
        ))?;
        registry.register(Box::new(blocks_mined.clone()))?;

        let reorgs = IntCounter::with_opts(Opts::new(
            "reorgs_total",
            "Total number of canonical branch switches",
        ))?;
        registry.register(Box::new(reorgs.clone()))?;

        // Block ingestion latency.
        let block_ingest_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "block_ingest_seconds",
                "Time to ingest one block (decode, validate, link, persist) in seconds",
            )
            .buckets(vec![
                0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25,
            ]),
        )?;
        registry.register(Box::new(block_ingest_seconds.clone()))?;

        // Tree shape gauges, refreshed from `ChainStats` snapshots.
        let canonical_depth = IntGauge::with_opts(Opts::new(
            "canonical_depth",
            "Depth of the canonical chain in blocks",
        ))?;
        registry.register(Box::new(canonical_depth.clone()))?;

        let best_fork_depth = IntGauge::with_opts(Opts::new(
            "best_fork_depth",
            "Depth of the deepest non-canonical branch",
        ))?;
        registry.register(Box::new(best_fork_depth.clone()))?;

        let total_blocks = IntGauge::with_opts(Opts::new(
            "total_blocks",
            "Number of blocks known to the tree across all branches",
        ))?;
        registry.register(Box::new(total_blocks.clone()))?;

        let stale_blocks = IntGauge::with_opts(Opts::new(
            "stale_blocks",
            "Number of blocks outside the canonical path",
        ))?;
        registry.register(Box::new(stale_blocks.clone()))?;

        let fork_count = IntGauge::with_opts(Opts::new(
            "fork_count",
            "Number of distinct branch identifiers in the tree",
        ))?;
        registry.register(Box::new(fork_count.clone()))?;

        let pending_messages = IntGauge::with_opts(Opts::new(
            "pending_messages",
            "Number of messages waiting in the pending queue",
        ))?;
        registry.register(Box::new(pending_messages.clone()))?;

        Ok(Self {
            blocks_accepted,
            blocks_rejected,
            messages_accepted,
            messages_rejected,
            blocks_mined,
            reorgs,
            block_ingest_seconds,
            canonical_depth,
            best_fork_depth,
            total_blocks,
            stale_blocks,
            fork_count,
            pending_messages,
        })
    }

    /// Folds a [`ChainStats`] snapshot into the gauges and into the
    /// counters the engine tracks itself.
    pub fn observe_stats(&self, stats: &ChainStats) {
        self.canonical_depth.set(stats.canonical_depth as i64);
        self.best_fork_depth.set(stats.best_fork_depth as i64);
        self.total_blocks.set(stats.total_blocks as i64);
        self.stale_blocks.set(stats.stale_blocks as i64);
        self.fork_count.set(stats.fork_count as i64);
        self.pending_messages.set(stats.pending_messages as i64);

        // Counters only move forward; catch up to the engine's totals.
        let mined_seen = self.blocks_mined.get();
        if stats.mined_blocks > mined_seen {
            self.blocks_mined.inc_by(stats.mined_blocks - mined_seen);
        }
        let reorgs_seen = self.reorgs.get();
        if stats.reorgs > reorgs_seen {
            self.reorgs.inc_by(stats.reorgs - reorgs_seen);
        }
    }
}

/// Wrapper around a Prometheus registry and the chain metrics.
///
/// This is the main handle you pass around in the node. It can be wrapped
/// in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub chain: ChainMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the chain metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("ledger".to_string()), None)?;
        let chain = ChainMetrics::register(&registry)?;
        Ok(Self { registry, chain })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            eprintln!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
///
/// This function is `async` and is intended to be spawned onto a Tokio
/// runtime, e.g.:
///
/// ```ignore
/// let registry = Arc::new(MetricsRegistry::new()?);
/// let addr: SocketAddr = "127.0.0.1:9898".parse()?;
/// tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
/// ```
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                eprintln!("metrics exporter connection error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    fn dummy_stats() -> ChainStats {
        ChainStats {
            total_blocks: 7,
            canonical_tip: Some("ab".repeat(32)),
            canonical_depth: 5,
            best_fork_depth: 3,
            fork_count: 2,
            stale_blocks: 2,
            pending_messages: 4,
            covered_messages: 50,
            mined_blocks: 2,
            reorgs: 1,
        }
    }

    #[test]
    fn chain_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = ChainMetrics::register(&registry).expect("register metrics");

        metrics.blocks_accepted.inc();
        metrics
            .blocks_rejected
            .with_label_values(&["invalid_proof_of_work"])
            .inc();
        metrics.messages_accepted.inc();
        metrics.block_ingest_seconds.observe(0.0007);
        metrics.canonical_depth.set(3);

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn observe_stats_is_idempotent_for_counters() {
        let registry = Registry::new();
        let metrics = ChainMetrics::register(&registry).expect("register metrics");

        let stats = dummy_stats();
        metrics.observe_stats(&stats);
        metrics.observe_stats(&stats);

        assert_eq!(metrics.blocks_mined.get(), 2);
        assert_eq!(metrics.reorgs.get(), 1);
        assert_eq!(metrics.pending_messages.get(), 4);
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.chain.block_ingest_seconds.observe(0.01);
        let text = registry.gather_text();
        assert!(text.contains("ledger_block_ingest_seconds"));
    }
}
