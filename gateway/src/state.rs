//! Shared application state for the gateway.

use std::sync::Arc;

use ledger::{DefaultLedgerEngine, MetricsRegistry};

/// Shared state held by the API and background tasks.
///
/// This is wrapped in an [`Arc`] and passed to request handlers via Axum's
/// `State` extractor.
pub struct AppState {
    /// Embedded ledger engine (block tree + message queue + storage + keys).
    ///
    /// The engine takes `&self` everywhere and does its own locking, so no
    /// outer mutex is needed; handlers and miner threads share it directly.
    pub engine: Arc<DefaultLedgerEngine>,
    /// Metrics registry shared between handlers and the stats updater.
    pub metrics: Arc<MetricsRegistry>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
