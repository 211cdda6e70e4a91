// ledger/src/chain/fork.rs

//! Longest-chain selection over the block tree.

use crate::types::BlockHash;

/// What a newly inserted block did to the canonical tip.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TipChange {
    /// Block landed on a side branch; the canonical tip stands.
    Unchanged,
    /// Block is the first root the node has seen and becomes the tip.
    NewRoot,
    /// Block extends the current tip by one.
    Extended,
    /// Block tops a competing branch that is now strictly deepest; the
    /// canonical chain moved to it.
    Switched,
}

/// Tracks the canonical tip and the deepest competing branch.
///
/// Selection is longest-chain with a strict-greater rule: a branch only
/// takes over when its depth exceeds the canonical depth, so on equal
/// depth the earlier-seen chain keeps winning. The alternate pointer
/// remembers the deepest block seen off the canonical chain, which is
/// what the stats surface reports as the best fork.
#[derive(Debug, Default)]
pub struct ChainSelector {
    canonical_tip: Option<BlockHash>,
    canonical_depth: u64,
    fork_tip: Option<BlockHash>,
    fork_depth: u64,
}

impl ChainSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn canonical_tip(&self) -> Option<BlockHash> {
        self.canonical_tip
    }

    pub fn canonical_depth(&self) -> u64 {
        self.canonical_depth
    }

    pub fn fork_tip(&self) -> Option<BlockHash> {
        self.fork_tip
    }

    pub fn best_fork_depth(&self) -> u64 {
        self.fork_depth
    }

    /// Feeds one inserted block (its hash, parent link, and assigned depth)
    /// into the selection rule and reports how the tip moved.
    pub fn observe(&mut self, hash: BlockHash, parent: Option<BlockHash>, depth: u64) -> TipChange {
        let Some(tip) = self.canonical_tip else {
            self.canonical_tip = Some(hash);
            self.canonical_depth = depth;
            return TipChange::NewRoot;
        };

        if parent == Some(tip) {
            self.canonical_tip = Some(hash);
            self.canonical_depth = depth;
            return TipChange::Extended;
        }

        if depth > self.canonical_depth {
            // The superseded tip is by construction at least as deep as any
            // previously tracked alternate, so it takes that slot over.
            self.fork_tip = Some(tip);
            self.fork_depth = self.canonical_depth;
            self.canonical_tip = Some(hash);
            self.canonical_depth = depth;
            return TipChange::Switched;
        }

        if depth > self.fork_depth {
            self.fork_tip = Some(hash);
            self.fork_depth = depth;
        }
        TipChange::Unchanged
    }
}
