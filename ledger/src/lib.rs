//! Ledger library crate.
//!
//! This crate provides the core building blocks for a single-node
//! peer-to-peer append-only ledger:
//!
//! - strongly-typed domain types (`types`),
//! - a block tree, message queue, and chain engine (`chain`),
//! - a proof-of-work miner driven by the engine (`chain::miner`),
//! - ed25519 signing and verification (`keys`),
//! - storage backends (`storage`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level node configuration (`config`).
//!
//! Higher-level binaries can compose these pieces to build ledger
//! nodes, gateways, and experiment harnesses.

pub mod chain;
pub mod config;
pub mod keys;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-export top-level configuration types.
pub use config::{MetricsConfig, MiningConfig, NodeConfig};

// Re-export "core" chain types and traits.
pub use chain::{
    BlockNode, BlockTree, ChainConfig, ChainSelector, ChainStats, IngestError, LedgerEngine,
    MessageQueue, Miner, MinerControl, MinerStatus, MiningJob, TipChange,
};

// Re-export key services.
pub use keys::{AcceptAllKeys, Ed25519KeyRing, KeyService};

// Re-export storage backends.
pub use storage::{FileLedger, LedgerStore, MemLedger, StorageConfig, StorageError};

// Re-export metrics registry and chain metrics.
pub use metrics::{ChainMetrics, MetricsRegistry, run_prometheus_http_server};

// Re-export domain types at the crate root for convenience.
pub use types::*;

/// Type alias for the default storage backend of a "typical" node.
pub type DefaultLedgerStore = FileLedger;

/// Type alias for the default key service.
pub type DefaultKeyService = Ed25519KeyRing;

/// Type alias for the default engine stack.
///
/// This uses:
///
/// - [`DefaultLedgerStore`] (append-only ledger file),
/// - [`DefaultKeyService`] (ed25519 keyring).
pub type DefaultLedgerEngine = LedgerEngine<DefaultLedgerStore, DefaultKeyService>;
