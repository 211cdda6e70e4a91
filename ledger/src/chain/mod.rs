// ledger/src/chain/mod.rs

//! Chain core: block tree, longest-chain selection, message queueing,
//! proof-of-work mining, and the ingestion engine that ties them together.
//!
//! - configuration parameters ([`config::ChainConfig`]),
//! - the rejection taxonomy ([`error::IngestError`]),
//! - the block forest with fork bookkeeping ([`tree::BlockTree`]),
//! - canonical tip selection ([`fork::ChainSelector`]),
//! - the pending message queue ([`queue::MessageQueue`]),
//! - mining workers and their interruption protocol ([`miner`]),
//! - the engine orchestrating all of the above ([`engine::LedgerEngine`]).

pub mod config;
pub mod engine;
pub mod error;
pub mod fork;
pub mod miner;
pub mod queue;
pub mod tree;

pub use config::ChainConfig;
pub use engine::{ChainStats, LedgerEngine, MiningJob};
pub use error::IngestError;
pub use fork::{ChainSelector, TipChange};
pub use miner::{Miner, MinerControl, MinerStatus};
pub use queue::MessageQueue;
pub use tree::{BlockNode, BlockTree};
