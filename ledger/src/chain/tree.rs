// ledger/src/chain/tree.rs

//! Tree of all known blocks.
//!
//! The tree owns every accepted block, canonical or not:
//! - nodes live in a `HashMap<BlockHash, BlockNode>`; parent/child links are
//!   hashes, never references,
//! - depth is assigned on insert (roots start at 1),
//! - each top-level branch carries a fork id so competing lines of history
//!   can be told apart and measured,
//! - a bounded cache remembers recently rejected hashes so a block whose
//!   parent was thrown away can be diagnosed instead of just looking orphaned.
//!
//! Validation beyond structure (proof-of-work, message rules) happens before
//! `insert` is called; the tree only refuses duplicates and unknown parents.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::types::{Block, BlockHash, MessageId};

use super::error::IngestError;

/// A block plus its position in the tree.
#[derive(Debug)]
pub struct BlockNode {
    pub block: Block,
    pub hash: BlockHash,
    /// Children in arrival order. The first entry is the branch that keeps
    /// this node's fork id.
    pub children: Vec<BlockHash>,
    /// Distance from the root, with roots at depth 1.
    pub depth: u64,
    /// Identifier of the top-level branch this node belongs to.
    pub fork_id: u64,
    message_ids: Vec<MessageId>,
}

impl BlockNode {
    fn new(block: Block, hash: BlockHash, depth: u64, fork_id: u64) -> Self {
        let message_ids = block.messages.iter().map(|m| m.compute_id()).collect();
        Self {
            block,
            hash,
            children: Vec::new(),
            depth,
            fork_id,
            message_ids,
        }
    }

    /// Parent hash, or `None` for a root block.
    pub fn parent(&self) -> Option<BlockHash> {
        if self.block.parent.is_zero() {
            None
        } else {
            Some(self.block.parent)
        }
    }

    /// Ids of this block's messages, cached at insert time so chain walks
    /// never re-hash message bodies.
    pub fn message_ids(&self) -> &[MessageId] {
        &self.message_ids
    }
}

/// Bounded memory of rejected block hashes and why they were refused.
#[derive(Debug)]
struct RejectCache {
    order: VecDeque<BlockHash>,
    reasons: HashMap<BlockHash, IngestError>,
    capacity: usize,
}

impl RejectCache {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            reasons: HashMap::new(),
            capacity,
        }
    }

    fn note(&mut self, hash: BlockHash, reason: IngestError) {
        if self.capacity == 0 {
            return;
        }
        if self.reasons.insert(hash, reason).is_none() {
            self.order.push_back(hash);
            if self.order.len() > self.capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.reasons.remove(&evicted);
                }
            }
        }
    }

    fn reason(&self, hash: &BlockHash) -> Option<IngestError> {
        self.reasons.get(hash).copied()
    }
}

/// All known blocks, indexed by hash and linked into a forest.
///
/// Practically the forest holds a single root, but nothing structural
/// depends on that: a second root-sentinel block simply starts another
/// top-level branch with a fresh fork id.
#[derive(Debug)]
pub struct BlockTree {
    nodes: HashMap<BlockHash, BlockNode>,
    roots: Vec<BlockHash>,
    next_fork_id: u64,
    fork_depths: HashMap<u64, u64>,
    rejects: RejectCache,
}

impl BlockTree {
    pub fn new(reject_cache_capacity: usize) -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Vec::new(),
            next_fork_id: 0,
            fork_depths: HashMap::new(),
            rejects: RejectCache::new(reject_cache_capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.nodes.contains_key(hash)
    }

    pub fn get(&self, hash: &BlockHash) -> Option<&BlockNode> {
        self.nodes.get(hash)
    }

    pub fn roots(&self) -> &[BlockHash] {
        &self.roots
    }

    /// Number of distinct top-level branches seen so far.
    pub fn fork_count(&self) -> usize {
        self.fork_depths.len()
    }

    /// Deepest known block per fork id.
    pub fn fork_depths(&self) -> &HashMap<u64, u64> {
        &self.fork_depths
    }

    /// Links `block` into the tree under `hash` and returns its depth.
    ///
    /// Fork id assignment: every root gets a fresh id, the first child of a
    /// root inherits it, every further child of a root opens a new top-level
    /// branch with a fresh id, and all deeper blocks inherit their parent's.
    pub fn insert(&mut self, block: Block, hash: BlockHash) -> Result<u64, IngestError> {
        if self.nodes.contains_key(&hash) {
            return Err(IngestError::DuplicateBlock);
        }

        if block.parent.is_zero() {
            let fork_id = self.fresh_fork_id();
            self.nodes.insert(hash, BlockNode::new(block, hash, 1, fork_id));
            self.roots.push(hash);
            self.bump_fork_depth(fork_id, 1);
            return Ok(1);
        }

        let parent_hash = block.parent;
        let (parent_depth, parent_fork, branches_off_root) = match self.nodes.get(&parent_hash) {
            Some(parent) => (
                parent.depth,
                parent.fork_id,
                parent.parent().is_none() && !parent.children.is_empty(),
            ),
            None => return Err(IngestError::UnknownParent),
        };

        let depth = parent_depth + 1;
        let fork_id = if branches_off_root {
            self.fresh_fork_id()
        } else {
            parent_fork
        };

        self.nodes.insert(hash, BlockNode::new(block, hash, depth, fork_id));
        if let Some(parent) = self.nodes.get_mut(&parent_hash) {
            parent.children.push(hash);
        }
        self.bump_fork_depth(fork_id, depth);
        Ok(depth)
    }

    fn fresh_fork_id(&mut self) -> u64 {
        let id = self.next_fork_id;
        self.next_fork_id += 1;
        id
    }

    fn bump_fork_depth(&mut self, fork_id: u64, depth: u64) {
        self.fork_depths
            .entry(fork_id)
            .and_modify(|d| *d = (*d).max(depth))
            .or_insert(depth);
    }

    /// Records why a hash was refused, for later orphan diagnostics.
    pub fn note_reject(&mut self, hash: BlockHash, reason: IngestError) {
        self.rejects.note(hash, reason);
    }

    /// Looks up the recorded rejection reason for a hash, if still cached.
    pub fn rejected_reason(&self, hash: &BlockHash) -> Option<IngestError> {
        self.rejects.reason(hash)
    }

    /// Collects the ids of every message on the path from `tip` up to its
    /// root, inclusive.
    pub fn path_message_ids(&self, tip: &BlockHash) -> HashSet<MessageId> {
        let mut covered = HashSet::new();
        let mut cursor = Some(*tip);
        while let Some(hash) = cursor {
            match self.nodes.get(&hash) {
                Some(node) => {
                    covered.extend(node.message_ids.iter().copied());
                    cursor = node.parent();
                }
                None => break,
            }
        }
        covered
    }

    /// Returns `true` if any of `ids` already appears on the path from
    /// `start` up to its root.
    pub fn path_contains_any(&self, start: &BlockHash, ids: &[MessageId]) -> bool {
        let mut cursor = Some(*start);
        while let Some(hash) = cursor {
            match self.nodes.get(&hash) {
                Some(node) => {
                    if ids.iter().any(|id| node.message_ids.contains(id)) {
                        return true;
                    }
                    cursor = node.parent();
                }
                None => break,
            }
        }
        false
    }

    /// Hashes on the path from `tip` up to its root, tip first.
    pub fn path_hashes(&self, tip: &BlockHash) -> Vec<BlockHash> {
        let mut path = Vec::new();
        let mut cursor = Some(*tip);
        while let Some(hash) = cursor {
            match self.nodes.get(&hash) {
                Some(node) => {
                    path.push(hash);
                    cursor = node.parent();
                }
                None => break,
            }
        }
        path
    }

    /// Encoded wire strings of every block with `timestamp > since`, over
    /// all branches, in breadth-first order from the roots.
    pub fn blocks_since(&self, since: u64) -> Vec<String> {
        let mut out = Vec::new();
        let mut frontier: VecDeque<BlockHash> = self.roots.iter().copied().collect();
        while let Some(hash) = frontier.pop_front() {
            if let Some(node) = self.nodes.get(&hash) {
                if node.block.timestamp > since {
                    out.push(node.block.encode());
                }
                frontier.extend(node.children.iter().copied());
            }
        }
        out
    }

    /// Graphviz rendering of the forest, one node per block labelled with a
    /// short hash prefix and its depth.
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph blocks {\n  rankdir=LR;\n");
        let mut frontier: VecDeque<BlockHash> = self.roots.iter().copied().collect();
        while let Some(hash) = frontier.pop_front() {
            if let Some(node) = self.nodes.get(&hash) {
                let hex = hash.to_hex();
                dot.push_str(&format!(
                    "  \"{hex}\" [label=\"{} d={} f={}\"];\n",
                    &hex[..8],
                    node.depth,
                    node.fork_id
                ));
                for child in &node.children {
                    dot.push_str(&format!("  \"{hex}\" -> \"{}\";\n", child.to_hex()));
                }
                frontier.extend(node.children.iter().copied());
            }
        }
        dot.push_str("}\n");
        dot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HASH_LEN, Hash256, Message, MinerId, PublicKey, Signature};

    fn dummy_message(byte: u8) -> Message {
        Message {
            sender: PublicKey(vec![byte; 32]),
            timestamp: 1_700_000_000,
            payload: vec![byte],
            recipient: None,
            signature: Signature(vec![byte; 64]),
        }
    }

    fn dummy_block(parent: BlockHash, seed: u8, timestamp: u64) -> (Block, BlockHash) {
        let block = Block {
            nonce: u64::from(seed),
            parent,
            miner: MinerId(Hash256([seed; HASH_LEN])),
            timestamp,
            messages: vec![dummy_message(seed)],
        };
        let hash = block.compute_hash();
        (block, hash)
    }

    #[test]
    fn insert_assigns_depths_and_child_links() {
        let mut tree = BlockTree::new(8);
        let (root, root_hash) = dummy_block(BlockHash::zero(), 1, 100);
        let (child, child_hash) = dummy_block(root_hash, 2, 200);

        assert_eq!(tree.insert(root, root_hash), Ok(1));
        assert_eq!(tree.insert(child, child_hash), Ok(2));

        let root_node = tree.get(&root_hash).unwrap();
        assert_eq!(root_node.children, vec![child_hash]);
        assert!(root_node.parent().is_none());
        assert_eq!(tree.get(&child_hash).unwrap().parent(), Some(root_hash));
        assert_eq!(tree.roots(), &[root_hash]);
    }

    #[test]
    fn duplicate_and_orphan_blocks_are_refused() {
        let mut tree = BlockTree::new(8);
        let (root, root_hash) = dummy_block(BlockHash::zero(), 1, 100);
        tree.insert(root.clone(), root_hash).unwrap();
        assert_eq!(tree.insert(root, root_hash), Err(IngestError::DuplicateBlock));

        let unknown = BlockHash(Hash256([0xaa; HASH_LEN]));
        let (orphan, orphan_hash) = dummy_block(unknown, 2, 200);
        assert_eq!(tree.insert(orphan, orphan_hash), Err(IngestError::UnknownParent));
        assert_eq!(tree.len(), 1);
        assert!(!tree.contains(&orphan_hash));
    }

    #[test]
    fn fork_ids_split_only_at_the_root() {
        let mut tree = BlockTree::new(8);
        let (root, root_hash) = dummy_block(BlockHash::zero(), 1, 100);
        let (a1, a1_hash) = dummy_block(root_hash, 2, 200);
        let (b1, b1_hash) = dummy_block(root_hash, 3, 300);
        let (a2, a2_hash) = dummy_block(a1_hash, 4, 400);
        let (a2_alt, a2_alt_hash) = dummy_block(a1_hash, 5, 500);

        tree.insert(root, root_hash).unwrap();
        tree.insert(a1, a1_hash).unwrap();
        tree.insert(b1, b1_hash).unwrap();
        tree.insert(a2, a2_hash).unwrap();
        tree.insert(a2_alt, a2_alt_hash).unwrap();

        let root_fork = tree.get(&root_hash).unwrap().fork_id;
        // First child keeps the root's branch; the second opens a new one.
        assert_eq!(tree.get(&a1_hash).unwrap().fork_id, root_fork);
        let b_fork = tree.get(&b1_hash).unwrap().fork_id;
        assert_ne!(b_fork, root_fork);
        // Splits below the root never mint ids.
        assert_eq!(tree.get(&a2_hash).unwrap().fork_id, root_fork);
        assert_eq!(tree.get(&a2_alt_hash).unwrap().fork_id, root_fork);

        assert_eq!(tree.fork_count(), 2);
        assert_eq!(tree.fork_depths().get(&root_fork), Some(&3));
        assert_eq!(tree.fork_depths().get(&b_fork), Some(&2));
    }

    #[test]
    fn a_second_root_opens_its_own_branch() {
        let mut tree = BlockTree::new(8);
        let (first, first_hash) = dummy_block(BlockHash::zero(), 1, 100);
        let (second, second_hash) = dummy_block(BlockHash::zero(), 2, 200);

        tree.insert(first, first_hash).unwrap();
        tree.insert(second, second_hash).unwrap();

        assert_eq!(tree.roots().len(), 2);
        assert_ne!(
            tree.get(&first_hash).unwrap().fork_id,
            tree.get(&second_hash).unwrap().fork_id
        );
    }

    #[test]
    fn path_walks_collect_ancestor_messages() {
        let mut tree = BlockTree::new(8);
        let (root, root_hash) = dummy_block(BlockHash::zero(), 1, 100);
        let (child, child_hash) = dummy_block(root_hash, 2, 200);
        let root_msg_id = root.messages[0].compute_id();
        let child_msg_id = child.messages[0].compute_id();

        tree.insert(root, root_hash).unwrap();
        tree.insert(child, child_hash).unwrap();

        let covered = tree.path_message_ids(&child_hash);
        assert_eq!(covered.len(), 2);
        assert!(covered.contains(&root_msg_id) && covered.contains(&child_msg_id));

        assert!(tree.path_contains_any(&child_hash, &[root_msg_id]));
        let foreign = dummy_message(9).compute_id();
        assert!(!tree.path_contains_any(&child_hash, &[foreign]));

        assert_eq!(tree.path_hashes(&child_hash), vec![child_hash, root_hash]);
    }

    #[test]
    fn blocks_since_is_breadth_first_and_strictly_after() {
        let mut tree = BlockTree::new(8);
        let (root, root_hash) = dummy_block(BlockHash::zero(), 1, 100);
        let (a1, a1_hash) = dummy_block(root_hash, 2, 200);
        let (b1, b1_hash) = dummy_block(root_hash, 3, 300);
        let (a2, a2_hash) = dummy_block(a1_hash, 4, 400);

        let expect_all: Vec<String> = [&root, &a1, &b1, &a2].iter().map(|b| b.encode()).collect();
        tree.insert(root, root_hash).unwrap();
        tree.insert(a1, a1_hash).unwrap();
        tree.insert(b1, b1_hash).unwrap();
        tree.insert(a2, a2_hash).unwrap();

        assert_eq!(tree.blocks_since(0), expect_all);
        // The cutoff is strict: a block stamped exactly `since` is excluded.
        assert_eq!(tree.blocks_since(100), expect_all[1..].to_vec());
        assert!(tree.blocks_since(400).is_empty());
    }

    #[test]
    fn reject_cache_evicts_oldest_entries() {
        let mut tree = BlockTree::new(2);
        let hashes: Vec<_> = (0..3u8).map(|b| BlockHash(Hash256([b; HASH_LEN]))).collect();
        for hash in &hashes {
            tree.note_reject(*hash, IngestError::InvalidProofOfWork);
        }
        assert_eq!(tree.rejected_reason(&hashes[0]), None);
        assert_eq!(
            tree.rejected_reason(&hashes[2]),
            Some(IngestError::InvalidProofOfWork)
        );
    }

    #[test]
    fn dot_export_names_every_block_once() {
        let mut tree = BlockTree::new(8);
        let (root, root_hash) = dummy_block(BlockHash::zero(), 1, 100);
        let (child, child_hash) = dummy_block(root_hash, 2, 200);
        tree.insert(root, root_hash).unwrap();
        tree.insert(child, child_hash).unwrap();

        let dot = tree.to_dot();
        assert!(dot.starts_with("digraph blocks {"));
        assert_eq!(dot.matches(&root_hash.to_hex()).count(), 2);
        assert_eq!(dot.matches("->").count(), 1);
    }
}
