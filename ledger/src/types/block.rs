// ledger/src/types/block.rs

//! Block type, canonical wire form, and proof-of-work checks.
//!
//! A block serializes to a flat pipe-separated string:
//!
//! ```text
//! <nonce-hex>|<parent-hash-hex>|<miner-hash-hex>|<timestamp>|<msg_1>|...|<msg_k>
//! ```
//!
//! The nonce is a fixed-width 16-digit hex rendering of a `u64`; parent and
//! miner hashes are 64 hex digits; messages use their own canonical form
//! (which contains no `|`, so the split is unambiguous). The block hash is
//! the BLAKE3-256 digest of this exact string, and proof-of-work is judged
//! by how many leading zero hex digits that hash has. Decoding is strict
//! enough that `decode(s)` succeeding implies `encode(decode(s)) == s`.

use serde::{Deserialize, Serialize};

use super::{Hash256, Message, MinerId, is_lower_hex, parse_decimal};

/// Strongly-typed block hash.
///
/// This is the content hash of a [`Block`], computed as a BLAKE3-256 digest
/// over the canonical wire string. It is both the block's identity in the
/// tree and the value proof-of-work is checked against.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlockHash(pub Hash256);

impl BlockHash {
    /// The all-zero sentinel used as the parent of a root block.
    pub fn zero() -> Self {
        BlockHash(Hash256([0u8; super::HASH_LEN]))
    }

    /// Returns `true` if this is the root sentinel.
    pub fn is_zero(&self) -> bool {
        self.0.0 == [0u8; super::HASH_LEN]
    }

    /// Renders the hash as 64 lowercase hex digits.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// Parses a block hash from exactly 64 lowercase hex digits.
    pub fn from_hex(s: &str) -> Option<Self> {
        Hash256::from_hex(s).map(BlockHash)
    }
}

/// A unit of chain extension: a proof-of-work nonce over a parent link,
/// miner attribution, timestamp, and an ordered list of messages.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Block {
    /// Proof-of-work search variable.
    pub nonce: u64,
    /// Hash of the parent block, or [`BlockHash::zero`] for a root block.
    pub parent: BlockHash,
    /// Identity hash of the miner that produced this block.
    pub miner: MinerId,
    /// Wall-clock creation time, in seconds since Unix epoch.
    pub timestamp: u64,
    /// Ordered list of included messages. The ingestion engine enforces the
    /// fixed per-block count; the codec itself is count-agnostic.
    pub messages: Vec<Message>,
}

/// Width of the canonical hex rendering of the nonce.
const NONCE_HEX_LEN: usize = 16;

impl Block {
    /// Returns the canonical wire string for this block.
    ///
    /// All hashing and ledger-file persistence goes through this method, so
    /// the rendering must stay stable: a formatting change would change
    /// every block hash.
    pub fn encode(&self) -> String {
        let mut out = format!(
            "{:016x}|{}|{}|{}",
            self.nonce,
            self.parent.to_hex(),
            self.miner.to_hex(),
            self.timestamp
        );
        for msg in &self.messages {
            out.push('|');
            out.push_str(&msg.encode());
        }
        out
    }

    /// Parses a block from its wire string.
    ///
    /// Fail-closed: a wrong field count, a nonce that is not exactly 16
    /// lowercase hex digits, a malformed hash or timestamp, or any
    /// undecodable message yields `None`.
    pub fn decode(s: &str) -> Option<Block> {
        let mut fields = s.split('|');

        let nonce_hex = fields.next()?;
        if nonce_hex.len() != NONCE_HEX_LEN || !is_lower_hex(nonce_hex) {
            return None;
        }
        let nonce = u64::from_str_radix(nonce_hex, 16).ok()?;

        let parent = BlockHash::from_hex(fields.next()?)?;
        let miner = MinerId::from_hex(fields.next()?)?;
        let timestamp = parse_decimal(fields.next()?)?;

        let mut messages = Vec::new();
        for msg_str in fields {
            messages.push(Message::decode(msg_str)?);
        }

        Some(Block {
            nonce,
            parent,
            miner,
            timestamp,
            messages,
        })
    }

    /// Computes the canonical BLAKE3-256 hash of this block.
    ///
    /// This must remain stable across nodes for chain agreement to work:
    /// the hash is taken over [`Block::encode`], and the strict decoder
    /// guarantees peers hash the same string we do.
    pub fn compute_hash(&self) -> BlockHash {
        BlockHash(Hash256::compute(self.encode().as_bytes()))
    }

    /// Returns `true` if this block's hash meets the proof-of-work target
    /// of at least `leading_zeros` leading zero hex digits.
    pub fn has_valid_work(&self, leading_zeros: u32) -> bool {
        self.compute_hash().0.leading_zero_hex_digits() >= leading_zeros
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HASH_LEN, PublicKey, Signature};

    fn dummy_message(byte: u8) -> Message {
        Message {
            sender: PublicKey(vec![byte; 32]),
            timestamp: 1_700_000_000 + u64::from(byte),
            payload: vec![byte, byte.wrapping_add(1)],
            recipient: None,
            signature: Signature(vec![byte; 64]),
        }
    }

    fn dummy_block(message_count: u8) -> Block {
        Block {
            nonce: 0xdead_beef_0000_0001,
            parent: BlockHash(Hash256([7u8; HASH_LEN])),
            miner: MinerId(Hash256([9u8; HASH_LEN])),
            timestamp: 1_700_000_100,
            messages: (0..message_count).map(dummy_message).collect(),
        }
    }

    #[test]
    fn encode_decode_roundtrip_is_exact() {
        let block = dummy_block(3);
        let wire = block.encode();
        let decoded = Block::decode(&wire).expect("valid wire string");
        assert_eq!(decoded, block);
        assert_eq!(decoded.encode(), wire);
    }

    #[test]
    fn root_sentinel_roundtrips() {
        let mut block = dummy_block(1);
        block.parent = BlockHash::zero();
        let decoded = Block::decode(&block.encode()).expect("valid wire string");
        assert!(decoded.parent.is_zero());
    }

    #[test]
    fn block_hash_is_deterministic_and_content_sensitive() {
        let block = dummy_block(2);
        assert_eq!(block.compute_hash(), block.compute_hash());

        let mut other = block.clone();
        other.nonce += 1;
        assert_ne!(other.compute_hash(), block.compute_hash());
    }

    #[test]
    fn decode_rejects_bad_nonce_field() {
        let wire = dummy_block(1).encode();
        // Nonce must be exactly 16 lowercase hex digits.
        let short = wire.replacen("dead", "", 1);
        assert!(Block::decode(&short).is_none());
        let upper = wire.replacen("dead", "DEAD", 1);
        assert!(Block::decode(&upper).is_none());
    }

    #[test]
    fn decode_rejects_missing_fields_and_bad_messages() {
        assert!(Block::decode("").is_none());
        assert!(Block::decode("0000000000000001|ab").is_none());

        let block = dummy_block(1);
        let wire = format!(
            "{:016x}|{}|{}|{}|not-a-message",
            block.nonce,
            block.parent.to_hex(),
            block.miner.to_hex(),
            block.timestamp
        );
        assert!(Block::decode(&wire).is_none());
    }

    #[test]
    fn work_check_counts_leading_zero_digits() {
        let block = dummy_block(1);
        // Every hash satisfies a zero-difficulty target.
        assert!(block.has_valid_work(0));
        // No BLAKE3 output is all zeros.
        assert!(!block.has_valid_work(64));
    }
}
