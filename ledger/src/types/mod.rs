//! Core domain types used by the ledger
//!
//! This module defines strongly-typed hashes, miner and message identifiers,
//! and the key/signature byte wrappers shared across the ledger
//! implementation. The goal is to avoid "naked" byte buffers in public APIs
//! and instead use domain-specific newtypes.

use serde::{Deserialize, Serialize};

/// Block structure, canonical wire form, and proof-of-work checks.
pub mod block;
/// Message structure and canonical wire form.
pub mod message;

pub use block::{Block, BlockHash};
pub use message::Message;

/// Length in bytes of all 256-bit hash types used in this module.
pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit hash wrapper (BLAKE3-256).
///
/// This type is the backing representation for all fixed-size hashes in the
/// ledger (block hashes, message identifiers, miner identities). It is
/// always exactly [`HASH_LEN`] bytes long.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes a new [`Hash256`] as the BLAKE3-256 hash of `data`.
    ///
    /// The result is deterministic for a given byte slice and is suitable
    /// for use as an identifier or content hash, but it is **not**
    /// a password hash or KDF.
    pub fn compute(data: &[u8]) -> Self {
        let h = blake3::hash(data);
        Hash256(*h.as_bytes())
    }

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Renders the hash as 64 lowercase hex digits, the form used in the
    /// wire encoding of blocks.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hash from exactly 64 lowercase hex digits.
    ///
    /// Decoding is fail-closed: wrong length, uppercase digits, or non-hex
    /// characters all yield `None`.
    pub fn from_hex(s: &str) -> Option<Self> {
        if !is_lower_hex(s) {
            return None;
        }
        let bytes = hex::decode(s).ok()?;
        if bytes.len() != HASH_LEN {
            return None;
        }
        let mut arr = [0u8; HASH_LEN];
        arr.copy_from_slice(&bytes);
        Some(Hash256(arr))
    }

    /// Counts the number of leading zero hex digits (nibbles) of the hash.
    ///
    /// This is the quantity proof-of-work is measured in: a block is valid
    /// work iff its content hash has at least the configured number of
    /// leading zero hex digits.
    pub fn leading_zero_hex_digits(&self) -> u32 {
        let mut count = 0;
        for byte in &self.0 {
            if byte >> 4 != 0 {
                return count;
            }
            count += 1;
            if byte & 0x0f != 0 {
                return count;
            }
            count += 1;
        }
        count
    }
}

/// Message identifier: BLAKE3-256 of the message's canonical wire string.
///
/// Deduplication everywhere in the ledger (queue membership, covered-message
/// bookkeeping, per-path uniqueness) is by this content hash, never by
/// object identity.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Hash256);

impl MessageId {
    /// Returns the underlying [`Hash256`] backing this identifier.
    pub fn as_hash(&self) -> &Hash256 {
        &self.0
    }

    /// Renders the identifier as 64 lowercase hex digits.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

/// Miner identity (hash of the miner's public key).
///
/// `MinerId` is derived from a signing public key using
/// [`Hash256::compute`]. This keeps block attribution short and opaque
/// while preserving a stable mapping from public keys.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct MinerId(pub Hash256);

impl MinerId {
    /// Derives a [`MinerId`] from a public key.
    ///
    /// The caller is responsible for passing the canonical byte encoding of
    /// the key; different encodings of the same key yield different miner
    /// identities.
    pub fn from_public_key(pk_bytes: &[u8]) -> Self {
        MinerId(Hash256::compute(pk_bytes))
    }

    /// Returns the underlying [`Hash256`] backing this identity.
    pub fn as_hash(&self) -> &Hash256 {
        &self.0
    }

    /// Renders the identity as 64 lowercase hex digits.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// Parses a miner identity from exactly 64 lowercase hex digits.
    pub fn from_hex(s: &str) -> Option<Self> {
        Hash256::from_hex(s).map(MinerId)
    }
}

/// Public key bytes, wrapped to avoid naked `Vec<u8>`.
///
/// This type is intentionally opaque: it does not interpret or validate the
/// key material, it only carries it through the API in a structured way.
/// The signature verifier decides whether the bytes form a usable key.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublicKey(pub Vec<u8>);

impl PublicKey {
    /// Returns the raw public key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Renders the key as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parses a key from a non-empty lowercase hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        decode_lower_hex(s).map(PublicKey)
    }
}

/// Detached signature bytes over a message's signed section.
///
/// The encoding is scheme-specific and must match whatever the verifying
/// implementation expects (e.g. 64-byte Ed25519 signatures).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Renders the signature as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parses a signature from a non-empty lowercase hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        decode_lower_hex(s).map(Signature)
    }
}

/// Returns `true` iff `s` is non-empty and consists only of lowercase hex
/// digits.
///
/// The wire grammar is strict: uppercase hex is rejected so that decoding a
/// valid string and re-encoding it reproduces the input byte for byte, which
/// in turn makes content hashes unambiguous.
pub(crate) fn is_lower_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Decodes a non-empty, even-length, lowercase hex field of the wire
/// grammar into raw bytes.
pub(crate) fn decode_lower_hex(s: &str) -> Option<Vec<u8>> {
    if !is_lower_hex(s) {
        return None;
    }
    hex::decode(s).ok()
}

/// Parses a base-10 `u64` field of the wire grammar.
///
/// Strict on purpose: no sign, no surrounding whitespace, and no redundant
/// leading zeros, so that re-encoding reproduces the input exactly.
pub(crate) fn parse_decimal(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}
