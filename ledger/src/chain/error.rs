// ledger/src/chain/error.rs

use std::fmt;

/// Reasons a candidate message or block is refused by the engine.
///
/// Every variant except [`IngestError::LedgerAppend`] is a recoverable
/// rejection of one piece of peer input; none of them poison the node's
/// own state. `LedgerAppend` means the durable log can no longer be
/// written and the node is halting.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IngestError {
    /// Input string did not decode as a canonical wire form.
    MalformedWire,
    /// A message signature failed ed25519 verification.
    InvalidSignature,
    /// Block hash does not meet the leading-zero difficulty target.
    InvalidProofOfWork,
    /// Block does not carry exactly the configured number of messages.
    WrongMessageCount,
    /// Block references a parent hash the tree has never seen.
    UnknownParent,
    /// Block hash is already present in the tree.
    DuplicateBlock,
    /// Message already queued, or already included on the relevant chain.
    DuplicateMessage,
    /// Appending to the persisted ledger failed. Fatal: the node cannot
    /// safely continue without a durable log, so the engine shuts down.
    LedgerAppend,
}

impl IngestError {
    /// Stable short name, usable as a metrics label value.
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestError::MalformedWire => "malformed_wire",
            IngestError::InvalidSignature => "invalid_signature",
            IngestError::InvalidProofOfWork => "invalid_proof_of_work",
            IngestError::WrongMessageCount => "wrong_message_count",
            IngestError::UnknownParent => "unknown_parent",
            IngestError::DuplicateBlock => "duplicate_block",
            IngestError::DuplicateMessage => "duplicate_message",
            IngestError::LedgerAppend => "ledger_append",
        }
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::MalformedWire => write!(f, "malformed wire string"),
            IngestError::InvalidSignature => write!(f, "message signature verification failed"),
            IngestError::InvalidProofOfWork => write!(f, "block hash misses difficulty target"),
            IngestError::WrongMessageCount => write!(f, "block message count differs from batch size"),
            IngestError::UnknownParent => write!(f, "parent block is not in the tree"),
            IngestError::DuplicateBlock => write!(f, "block is already in the tree"),
            IngestError::DuplicateMessage => write!(f, "message is already queued or on chain"),
            IngestError::LedgerAppend => write!(f, "ledger append failed; node is halting"),
        }
    }
}

impl std::error::Error for IngestError {}
