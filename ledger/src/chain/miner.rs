// ledger/src/chain/miner.rs

//! Proof-of-work mining workers and the shared interruption protocol.
//!
//! Miners sit in a loop of:
//!
//! 1. [`LedgerEngine::wait_for_work`]: block until a full message batch is
//!    queued, then take it together with the current tip,
//! 2. nonce search: rehash random-nonce candidates until one meets the
//!    difficulty target,
//! 3. [`LedgerEngine::submit_mined_block`] on success, or
//!    [`LedgerEngine::return_unmined_messages`] when interrupted.
//!
//! Interruption runs over a [`MinerControl`] word the engine owns: a status
//! flag (`Continue` / `GivenBlock` / `MinedBlock`) plus a tip epoch counter.
//! The engine bumps the epoch under its state lock every time the canonical
//! tip moves, so a miner holding a [`MiningJob`] detects staleness by
//! comparing epochs once per nonce attempt. The flag carries intent (who
//! moved the tip) but the epoch is what makes the pulse impossible to miss:
//! flag transitions can be overwritten by racing workers, epoch comparisons
//! cannot.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::keys::KeyService;
use crate::storage::LedgerStore;
use crate::types::{Block, MinerId};

use super::engine::{LedgerEngine, MiningJob};

/// Tri-state flag describing why miners should (or should not) keep going.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum MinerStatus {
    /// Normal operation: keep searching.
    Continue = 0,
    /// A peer block moved the tip; abandon the current search.
    GivenBlock = 1,
    /// A local miner found a block; abandon the current search.
    MinedBlock = 2,
}

impl MinerStatus {
    fn from_u8(value: u8) -> MinerStatus {
        match value {
            1 => MinerStatus::GivenBlock,
            2 => MinerStatus::MinedBlock,
            _ => MinerStatus::Continue,
        }
    }
}

/// Lock-free control word shared between the engine and all miners.
#[derive(Debug, Default)]
pub struct MinerControl {
    status: AtomicU8,
    tip_epoch: AtomicU64,
}

impl MinerControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> MinerStatus {
        MinerStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    pub fn set_status(&self, status: MinerStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }

    /// Current tip epoch. Incremented on every canonical tip movement.
    pub fn epoch(&self) -> u64 {
        self.tip_epoch.load(Ordering::SeqCst)
    }

    pub(crate) fn bump_epoch(&self) {
        self.tip_epoch.fetch_add(1, Ordering::SeqCst);
    }
}

/// One mining worker bound to a shared engine.
pub struct Miner<S, K> {
    engine: Arc<LedgerEngine<S, K>>,
    miner_id: MinerId,
}

impl<S, K> Miner<S, K>
where
    S: LedgerStore,
    K: KeyService,
{
    /// Creates a worker stamping blocks with the engine's local identity.
    pub fn new(engine: Arc<LedgerEngine<S, K>>) -> Self {
        let miner_id = engine.local_miner_id();
        Self { engine, miner_id }
    }

    /// Runs the take-batch / search / submit loop until the engine shuts
    /// down.
    pub fn run(&self) {
        info!(miner = %self.miner_id.to_hex(), "miner worker started");
        while let Some(job) = self.engine.wait_for_work() {
            self.mine_job(job);
        }
        info!(miner = %self.miner_id.to_hex(), "miner worker stopped");
    }

    /// Spawns a worker on a dedicated OS thread. Nonce search is pure CPU
    /// work, so miners get real threads rather than async tasks.
    pub fn spawn(engine: Arc<LedgerEngine<S, K>>) -> std::thread::JoinHandle<()>
    where
        S: 'static,
        K: 'static,
    {
        std::thread::spawn(move || Miner::new(engine).run())
    }

    /// Searches for a valid nonce over one batch.
    ///
    /// The candidate keeps its message batch for the whole search; only the
    /// nonce and timestamp change between attempts. Interruption is checked
    /// once per attempt, and an interrupted batch goes back to the queue
    /// minus whatever the new canonical chain already covers.
    fn mine_job(&self, job: MiningJob) {
        let mut candidate = Block {
            nonce: 0,
            parent: job.parent,
            miner: self.miner_id,
            timestamp: current_unix_timestamp(),
            messages: job.messages.iter().map(|(_, m)| m.clone()).collect(),
        };
        let difficulty = self.engine.config.pow_leading_zeros;
        let control = self.engine.miner_control();
        let mut attempts = 0u64;

        loop {
            if self.engine.is_stopping()
                || control.epoch() != job.epoch
                || control.status() == MinerStatus::GivenBlock
            {
                if control.status() == MinerStatus::GivenBlock {
                    control.set_status(MinerStatus::Continue);
                }
                debug!(attempts, "mining interrupted; returning batch to the queue");
                self.engine.return_unmined_messages(job.messages);
                return;
            }

            candidate.nonce = rand::random();
            candidate.timestamp = current_unix_timestamp();
            attempts += 1;

            let hash = candidate.compute_hash();
            if hash.0.leading_zero_hex_digits() >= difficulty {
                info!(block = %hash.to_hex(), attempts, "mined block");
                if let Err(e) = self.engine.submit_mined_block(candidate) {
                    warn!(error = %e, "mined block was refused; returning batch");
                    self.engine.return_unmined_messages(job.messages);
                }
                return;
            }
        }
    }
}

/// Returns the current wall-clock time as seconds since Unix epoch.
fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::config::ChainConfig;
    use crate::keys::AcceptAllKeys;
    use crate::storage::MemLedger;
    use crate::types::{Message, PublicKey, Signature};

    fn engine_with_difficulty(
        pow_leading_zeros: u32,
    ) -> Arc<LedgerEngine<MemLedger, AcceptAllKeys>> {
        let config = ChainConfig {
            messages_per_block: 2,
            pow_leading_zeros,
            reject_cache_capacity: 16,
        };
        Arc::new(LedgerEngine::new(config, AcceptAllKeys, MemLedger::new()))
    }

    fn queue_batch(engine: &LedgerEngine<MemLedger, AcceptAllKeys>) -> Vec<String> {
        (1..=2u8)
            .map(|byte| {
                let message = Message {
                    sender: PublicKey(vec![byte; 32]),
                    timestamp: 1_700_000_000,
                    payload: vec![byte],
                    recipient: None,
                    signature: Signature(vec![byte; 64]),
                };
                let wire = message.encode();
                engine.ingest_message(&wire).expect("queue message");
                wire
            })
            .collect()
    }

    fn wait_until(deadline_ms: u64, mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..deadline_ms / 10 {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        check()
    }

    #[test]
    fn status_survives_the_u8_roundtrip() {
        let control = MinerControl::new();
        assert_eq!(control.status(), MinerStatus::Continue);
        control.set_status(MinerStatus::MinedBlock);
        assert_eq!(control.status(), MinerStatus::MinedBlock);
        control.bump_epoch();
        assert_eq!(control.epoch(), 1);
    }

    #[test]
    fn miner_extends_the_chain_at_low_difficulty() {
        let engine = engine_with_difficulty(1);
        queue_batch(&engine);

        let worker = Miner::spawn(engine.clone());
        assert!(wait_until(5_000, || engine.stats().canonical_depth == 1));
        engine.shutdown();
        worker.join().expect("worker exits");

        let mined = engine.take_newly_mined_block().expect("mined block parked");
        let block = Block::decode(&mined).expect("valid wire form");
        assert!(block.has_valid_work(1));
        assert!(block.parent.is_zero());
        assert_eq!(block.miner, engine.local_miner_id());
        assert_eq!(block.messages.len(), 2);
        assert_eq!(engine.pending_message_count(), 0);
    }

    #[test]
    fn shutdown_mid_search_returns_the_batch() {
        // Difficulty 64 can never be met, so the worker searches until told
        // to stop.
        let engine = engine_with_difficulty(64);
        let wires = queue_batch(&engine);

        let worker = Miner::spawn(engine.clone());
        assert!(wait_until(5_000, || engine.pending_message_count() == 0));

        engine.shutdown();
        worker.join().expect("worker exits");
        assert_eq!(engine.pending_message_count(), 2);
        for wire in &wires {
            assert!(engine.ingest_message(wire).is_err(), "message should be back in the queue");
        }
    }

    #[test]
    fn stale_epoch_aborts_before_the_first_attempt() {
        let engine = engine_with_difficulty(64);
        queue_batch(&engine);
        let job = engine.wait_for_work().expect("batch available");

        engine.miner_control().bump_epoch();
        Miner::new(engine.clone()).mine_job(job);
        assert_eq!(engine.pending_message_count(), 2);
    }

    #[test]
    fn given_block_flag_is_acknowledged_once() {
        let engine = engine_with_difficulty(64);
        queue_batch(&engine);
        let job = engine.wait_for_work().expect("batch available");

        engine.miner_control().set_status(MinerStatus::GivenBlock);
        Miner::new(engine.clone()).mine_job(job);
        assert_eq!(engine.miner_control().status(), MinerStatus::Continue);
        assert_eq!(engine.pending_message_count(), 2);
    }
}
