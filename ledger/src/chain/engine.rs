// ledger/src/chain/engine.rs

//! Ledger engine: validation, chain selection, and persistence.
//!
//! The engine wires together:
//!
//! - a [`BlockTree`] holding every accepted block,
//! - a [`ChainSelector`] tracking the canonical tip and best fork,
//! - a [`MessageQueue`] of messages awaiting inclusion,
//! - a [`KeyService`] for message signature checks,
//! - a [`LedgerStore`] for the append-only ledger file, and
//! - a [`MinerControl`] used to interrupt in-flight mining.
//!
//! All mutable chain state sits behind one mutex, so every ingestion and
//! reconciliation is serialized. Proof-of-work search never holds that lock;
//! miners interact through [`LedgerEngine::wait_for_work`] and the lock-free
//! control word. Ledger-file writes are staged under the lock in acceptance
//! order and flushed outside it, so a crash can only ever cost the staged
//! tail of the file. If an append itself fails, flushing stops at the
//! failed line so the file stays a prefix of acceptance order, the fault is
//! recorded, and the engine shuts down: a node whose durable log can no
//! longer grow must not keep accepting blocks it could never replay.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::keys::KeyService;
use crate::storage::{LedgerStore, StorageError};
use crate::types::{Block, BlockHash, Hash256, Message, MessageId, MinerId};

use super::config::ChainConfig;
use super::error::IngestError;
use super::fork::{ChainSelector, TipChange};
use super::miner::{MinerControl, MinerStatus};
use super::queue::MessageQueue;
use super::tree::BlockTree;

/// One batch of mining work.
///
/// `epoch` is the tip epoch sampled when the batch was handed out; the
/// miner compares it against the live epoch to detect that the canonical
/// tip moved while it was searching.
#[derive(Debug)]
pub struct MiningJob {
    /// Hash the candidate block must name as its parent. The zero sentinel
    /// when the node has no blocks yet.
    pub parent: BlockHash,
    /// Tip epoch at hand-out time.
    pub epoch: u64,
    /// The messages to include, in queue order.
    pub messages: Vec<(MessageId, Message)>,
}

/// Snapshot of chain-level counters for health and stats surfaces.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ChainStats {
    pub total_blocks: usize,
    pub canonical_tip: Option<String>,
    pub canonical_depth: u64,
    pub best_fork_depth: u64,
    pub fork_count: usize,
    pub stale_blocks: usize,
    pub pending_messages: usize,
    pub covered_messages: usize,
    pub mined_blocks: u64,
    pub reorgs: u64,
}

/// Everything guarded by the engine's single state lock.
struct ChainState {
    tree: BlockTree,
    selector: ChainSelector,
    queue: MessageQueue,
    /// Ids of every message on the canonical root-to-tip path.
    covered: HashSet<MessageId>,
    /// Encoded block lines accepted but not yet written to the store.
    staged: Vec<String>,
    /// Last self-mined block awaiting pickup by the networking layer.
    mined_out: Option<String>,
    /// Count of accepted self-mined blocks.
    mined_blocks: u64,
    /// Count of canonical branch switches.
    reorgs: u64,
}

/// Ledger engine, generic over storage backend and key service.
///
/// The engine is fully `&self`: it is meant to sit in an `Arc` shared by
/// HTTP handlers and miner threads.
pub struct LedgerEngine<S, K> {
    pub config: ChainConfig,
    keys: K,
    store: Mutex<S>,
    state: Mutex<ChainState>,
    work_ready: Condvar,
    control: MinerControl,
    stopping: AtomicBool,
    /// Set once, by the first failed ledger append. Never cleared.
    fault: Mutex<Option<String>>,
}

impl<S, K> LedgerEngine<S, K>
where
    S: LedgerStore,
    K: KeyService,
{
    /// Creates an engine with empty chain state on top of `store`.
    ///
    /// Call [`LedgerEngine::load`] afterwards to replay an existing ledger
    /// file; `new` itself does not touch the store.
    pub fn new(config: ChainConfig, keys: K, store: S) -> Self {
        let reject_cache_capacity = config.reject_cache_capacity;
        Self {
            config,
            keys,
            store: Mutex::new(store),
            state: Mutex::new(ChainState {
                tree: BlockTree::new(reject_cache_capacity),
                selector: ChainSelector::new(),
                queue: MessageQueue::new(),
                covered: HashSet::new(),
                staged: Vec::new(),
                mined_out: None,
                mined_blocks: 0,
                reorgs: 0,
            }),
            work_ready: Condvar::new(),
            control: MinerControl::new(),
            stopping: AtomicBool::new(false),
            fault: Mutex::new(None),
        }
    }

    /// Replays every line of the ledger store through the normal ingestion
    /// path, with persistence disabled, rebuilding tree, tips, covered set,
    /// and queue deterministically.
    ///
    /// Lines that fail to replay (truncated writes, hand-edited files) are
    /// logged and skipped. Must run before miners are spawned; it resets the
    /// control word to [`MinerStatus::Continue`] when done. Returns the
    /// number of blocks replayed.
    pub fn load(&self) -> Result<usize, StorageError> {
        let lines = {
            let store = self.lock_store();
            store.read_all()?
        };

        let mut replayed = 0usize;
        for (line_no, line) in lines.iter().enumerate() {
            match self.ingest_raw_block(line, false) {
                Ok(_) => replayed += 1,
                Err(e) => {
                    warn!(line = line_no + 1, error = %e, "skipping unreplayable ledger line");
                }
            }
        }

        self.control.set_status(MinerStatus::Continue);
        info!(replayed, skipped = lines.len() - replayed, "ledger replay finished");
        Ok(replayed)
    }

    /// Validates and queues one message from its wire string.
    ///
    /// Rejections carry no side effects: the queue and chain state are
    /// untouched whenever this returns `Err`.
    pub fn ingest_message(&self, raw: &str) -> Result<MessageId, IngestError> {
        let message = Message::decode(raw).ok_or(IngestError::MalformedWire)?;
        if !self.keys.verify(&message) {
            debug!("rejecting message with bad signature");
            return Err(IngestError::InvalidSignature);
        }

        let id = message.compute_id();
        let mut state = self.lock_state();
        if state.covered.contains(&id) || !state.queue.push(id, message) {
            return Err(IngestError::DuplicateMessage);
        }
        debug!(message = %id.to_hex(), pending = state.queue.len(), "queued message");
        if state.queue.len() >= self.config.messages_per_block {
            self.work_ready.notify_all();
        }
        Ok(id)
    }

    /// Validates and inserts one peer block from its wire string, persisting
    /// it to the ledger store on acceptance.
    pub fn ingest_block(&self, raw: &str) -> Result<BlockHash, IngestError> {
        self.ingest_raw_block(raw, true)
    }

    /// Inserts a block produced by a local miner.
    ///
    /// Same validation as [`LedgerEngine::ingest_block`], plus the mined
    /// block is parked for [`LedgerEngine::take_newly_mined_block`] and the
    /// control word runs through `MinedBlock` back to `Continue`.
    pub fn submit_mined_block(&self, block: Block) -> Result<BlockHash, IngestError> {
        self.ingest_block_inner(block, true, true)
    }

    fn ingest_raw_block(&self, raw: &str, persist: bool) -> Result<BlockHash, IngestError> {
        let block = Block::decode(raw).ok_or(IngestError::MalformedWire)?;
        self.ingest_block_inner(block, persist, false)
    }

    fn ingest_block_inner(
        &self,
        block: Block,
        persist: bool,
        self_mined: bool,
    ) -> Result<BlockHash, IngestError> {
        // The canonical string is both the hashing preimage and the ledger
        // file line; the strict codec guarantees it equals the peer's input.
        let encoded = block.encode();
        let hash = BlockHash(Hash256::compute(encoded.as_bytes()));
        let ids: Vec<MessageId> = block.messages.iter().map(|m| m.compute_id()).collect();
        let parent_hash = block.parent;
        let parent_link = (!parent_hash.is_zero()).then_some(parent_hash);

        let mut state = self.lock_state();

        if state.tree.contains(&hash) {
            return Err(IngestError::DuplicateBlock);
        }
        if block.messages.len() != self.config.messages_per_block {
            state.tree.note_reject(hash, IngestError::WrongMessageCount);
            debug!(block = %hash.to_hex(), count = block.messages.len(), "rejecting block: wrong message count");
            return Err(IngestError::WrongMessageCount);
        }
        if hash.0.leading_zero_hex_digits() < self.config.pow_leading_zeros {
            state.tree.note_reject(hash, IngestError::InvalidProofOfWork);
            debug!(block = %hash.to_hex(), "rejecting block: insufficient work");
            return Err(IngestError::InvalidProofOfWork);
        }

        let mut unique = HashSet::with_capacity(ids.len());
        if !ids.iter().all(|id| unique.insert(*id)) {
            state.tree.note_reject(hash, IngestError::DuplicateMessage);
            debug!(block = %hash.to_hex(), "rejecting block: repeated message within block");
            return Err(IngestError::DuplicateMessage);
        }

        if let Some(parent) = parent_link {
            if !state.tree.contains(&parent) {
                match state.tree.rejected_reason(&parent) {
                    Some(reason) => warn!(
                        block = %hash.to_hex(),
                        parent = %parent.to_hex(),
                        %reason,
                        "orphan block: parent was rejected earlier"
                    ),
                    None => debug!(
                        block = %hash.to_hex(),
                        parent = %parent.to_hex(),
                        "orphan block: parent unknown"
                    ),
                }
                state.tree.note_reject(hash, IngestError::UnknownParent);
                return Err(IngestError::UnknownParent);
            }
        }

        // A message may appear once per root-to-tip path. The candidate's
        // path is its parent's; when the parent is the canonical tip the
        // covered set already holds exactly that path's ids.
        let duplicate_on_path = match parent_link {
            None => false,
            Some(parent) if state.selector.canonical_tip() == Some(parent) => {
                ids.iter().any(|id| state.covered.contains(id))
            }
            Some(parent) => state.tree.path_contains_any(&parent, &ids),
        };
        if duplicate_on_path {
            state.tree.note_reject(hash, IngestError::DuplicateMessage);
            debug!(block = %hash.to_hex(), "rejecting block: message already on its chain");
            return Err(IngestError::DuplicateMessage);
        }

        let old_tip = state.selector.canonical_tip();
        let depth = state.tree.insert(block, hash)?;
        let change = state.selector.observe(hash, parent_link, depth);

        // Queued copies of the block's messages are spoken for now, on
        // whichever branch the block landed.
        let id_set: HashSet<MessageId> = ids.iter().copied().collect();
        state.queue.remove_all(&id_set);

        match change {
            TipChange::NewRoot | TipChange::Extended => {
                state.covered.extend(ids.iter().copied());
            }
            TipChange::Switched => {
                let displaced = Self::reconcile(&mut state, old_tip, hash);
                state.reorgs += 1;
                warn!(
                    new_tip = %hash.to_hex(),
                    depth,
                    displaced,
                    "canonical chain switched branches"
                );
            }
            TipChange::Unchanged => {
                debug!(block = %hash.to_hex(), depth, "block joined a side branch");
            }
        }

        if change != TipChange::Unchanged {
            self.control.bump_epoch();
        }
        if self_mined {
            state.mined_out = Some(encoded.clone());
            state.mined_blocks += 1;
            self.control.set_status(MinerStatus::MinedBlock);
        } else if change != TipChange::Unchanged {
            self.control.set_status(MinerStatus::GivenBlock);
        }

        if persist {
            state.staged.push(encoded);
        }
        if state.queue.len() >= self.config.messages_per_block {
            self.work_ready.notify_all();
        }

        info!(
            block = %hash.to_hex(),
            depth,
            change = ?change,
            self_mined,
            "accepted block"
        );
        drop(state);

        if persist {
            if let Err(e) = self.flush_staged() {
                error!(error = %e, "ledger append failed; halting node");
                *self.lock_fault() = Some(e.to_string());
                self.shutdown();
                return Err(IngestError::LedgerAppend);
            }
        }
        if self_mined {
            self.control.set_status(MinerStatus::Continue);
        }
        Ok(hash)
    }

    /// Rebuilds the covered set for the new canonical path and moves
    /// messages between chain and queue accordingly. Returns how many
    /// displaced messages went back into the queue.
    fn reconcile(state: &mut ChainState, old_tip: Option<BlockHash>, new_tip: BlockHash) -> usize {
        let ChainState {
            tree,
            queue,
            covered,
            ..
        } = state;

        let new_covered = tree.path_message_ids(&new_tip);
        let old_path = match old_tip {
            Some(tip) => tree.path_hashes(&tip),
            None => Vec::new(),
        };

        // Walk the abandoned path oldest-first so displaced messages requeue
        // in the order they were originally chained.
        let mut displaced = 0usize;
        for hash in old_path.iter().rev() {
            if let Some(node) = tree.get(hash) {
                for (id, message) in node.message_ids().iter().zip(&node.block.messages) {
                    if !new_covered.contains(id) && queue.push(*id, message.clone()) {
                        displaced += 1;
                    }
                }
            }
        }

        queue.remove_all(&new_covered);
        *covered = new_covered;
        displaced
    }

    /// Blocks until a full batch of messages is available, then removes and
    /// returns it together with the parent to mine on.
    ///
    /// Returns `None` once [`LedgerEngine::shutdown`] has been called.
    pub fn wait_for_work(&self) -> Option<MiningJob> {
        let mut state = self.lock_state();
        loop {
            if self.stopping.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(messages) = state.queue.take_batch(self.config.messages_per_block) {
                let parent = state
                    .selector
                    .canonical_tip()
                    .unwrap_or_else(BlockHash::zero);
                return Some(MiningJob {
                    parent,
                    epoch: self.control.epoch(),
                    messages,
                });
            }
            state = match self.work_ready.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Puts a batch taken by [`LedgerEngine::wait_for_work`] back into the
    /// queue, dropping any message the canonical chain covered in the
    /// meantime.
    pub fn return_unmined_messages(&self, messages: Vec<(MessageId, Message)>) {
        if messages.is_empty() {
            return;
        }
        let mut state = self.lock_state();
        let mut returned = 0usize;
        for (id, message) in messages {
            if !state.covered.contains(&id) && state.queue.push(id, message) {
                returned += 1;
            }
        }
        if returned > 0 {
            debug!(returned, "returned unmined messages to the queue");
        }
        if state.queue.len() >= self.config.messages_per_block {
            self.work_ready.notify_all();
        }
    }

    /// Wakes every blocked miner and makes future [`wait_for_work`] calls
    /// return `None`.
    ///
    /// [`wait_for_work`]: LedgerEngine::wait_for_work
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.work_ready.notify_all();
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Number of messages currently awaiting inclusion.
    pub fn pending_message_count(&self) -> usize {
        self.lock_state().queue.len()
    }

    /// Drains at most one freshly mined block, as its wire string.
    pub fn take_newly_mined_block(&self) -> Option<String> {
        self.lock_state().mined_out.take()
    }

    /// Wire strings of every known block newer than `since`, across all
    /// branches, in breadth-first order.
    pub fn all_blocks_since(&self, since: u64) -> Vec<String> {
        self.lock_state().tree.blocks_since(since)
    }

    pub fn canonical_tip(&self) -> Option<BlockHash> {
        self.lock_state().selector.canonical_tip()
    }

    pub fn stats(&self) -> ChainStats {
        let state = self.lock_state();
        let total_blocks = state.tree.len();
        let canonical_depth = state.selector.canonical_depth();
        ChainStats {
            total_blocks,
            canonical_tip: state.selector.canonical_tip().map(|h| h.to_hex()),
            canonical_depth,
            best_fork_depth: state.selector.best_fork_depth(),
            fork_count: state.tree.fork_count(),
            stale_blocks: total_blocks.saturating_sub(canonical_depth as usize),
            pending_messages: state.queue.len(),
            covered_messages: state.covered.len(),
            mined_blocks: state.mined_blocks,
            reorgs: state.reorgs,
        }
    }

    /// Graphviz rendering of the block tree.
    pub fn tree_dot(&self) -> String {
        self.lock_state().tree.to_dot()
    }

    /// Identity hash miners should stamp into the blocks they produce.
    pub fn local_miner_id(&self) -> MinerId {
        self.keys.identity_hash()
    }

    /// Shared miner control word.
    pub fn miner_control(&self) -> &MinerControl {
        &self.control
    }

    /// Writes staged ledger lines to the store in acceptance order.
    ///
    /// The store lock is held for the whole drain, so concurrent acceptors
    /// queue up behind one writer and the file order matches commit order.
    /// Lock order is store before state; the state lock is only held while
    /// swapping the staged buffer out.
    ///
    /// Stops at the first failed append and re-stages the unwritten lines,
    /// keeping the file a prefix of acceptance order: a hole in the middle
    /// would silently orphan every descendant on the next replay.
    fn flush_staged(&self) -> Result<(), StorageError> {
        let mut store = self.lock_store();
        loop {
            let batch: Vec<String> = {
                let mut state = self.lock_state();
                std::mem::take(&mut state.staged)
            };
            if batch.is_empty() {
                return Ok(());
            }
            for (written, line) in batch.iter().enumerate() {
                if let Err(e) = store.append(line) {
                    let mut state = self.lock_state();
                    let mut unwritten = batch[written..].to_vec();
                    unwritten.extend(std::mem::take(&mut state.staged));
                    state.staged = unwritten;
                    return Err(e);
                }
            }
        }
    }

    /// Returns the storage fault that halted the node, if any.
    ///
    /// Binaries poll this and exit nonzero once it is set; the in-memory
    /// chain state is still consistent, but its durable log has stopped
    /// growing.
    pub fn storage_fault(&self) -> Option<String> {
        self.lock_fault().clone()
    }

    fn lock_fault(&self) -> MutexGuard<'_, Option<String>> {
        self.fault.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_store(&self) -> MutexGuard<'_, S> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
