//! Top-level configuration for a ledger node.
//!
//! This module aggregates configuration for:
//!
//! - chain parameters (`ChainConfig`),
//! - storage (ledger file path and creation flag),
//! - mining workers (enable flag + thread count),
//! - metrics exporter (enable flag + listen address).
//!
//! The goal is to have a single `NodeConfig` struct that higher-level
//! binaries (e.g. `main.rs`) can construct from defaults, config files,
//! or environment variables as needed.

use std::net::SocketAddr;

use crate::chain::ChainConfig;
use crate::storage::StorageConfig;

/// Configuration for the mining workers of a node.
#[derive(Clone, Debug)]
pub struct MiningConfig {
    /// Whether to spawn mining workers at all.
    pub enabled: bool,
    /// Number of OS threads searching for proofs concurrently.
    pub workers: usize,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: 1,
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Top-level configuration for a ledger node.
///
/// This aggregates all the sub-configs needed to wire up a typical node:
///
/// - chain tuning (`chain`),
/// - persistent storage (`storage`),
/// - mining workers (`mining`),
/// - Prometheus metrics exporter (`metrics`).
#[derive(Clone, Debug, Default)]
pub struct NodeConfig {
    pub chain: ChainConfig,
    pub storage: StorageConfig,
    pub mining: MiningConfig,
    pub metrics: MetricsConfig,
}
