// ledger/src/storage/mod.rs

//! Storage backends for the append-only ledger.
//!
//! The ledger's persistence model is deliberately plain: one canonical
//! block string per line, appended in acceptance order, replayed top to
//! bottom on startup. This module provides:
//!
//! - the [`LedgerStore`] trait the engine writes through,
//! - an in-memory store ([`mem::MemLedger`]) suitable for tests and
//!   devnets,
//! - a file-backed store ([`file::FileLedger`]) for real nodes.

use std::fmt;

pub mod file;
pub mod mem;

pub use file::{FileLedger, StorageConfig};
pub use mem::MemLedger;

/// Append-only line store.
///
/// Implementations must preserve append order in `read_all`, since replay
/// correctness depends on children appearing after their parents.
pub trait LedgerStore: Send {
    /// Appends one ledger line.
    fn append(&mut self, line: &str) -> Result<(), StorageError>;

    /// Returns every stored line, oldest first.
    fn read_all(&self) -> Result<Vec<String>, StorageError>;
}

/// Storage-level error type.
#[derive(Debug)]
pub enum StorageError {
    /// Underlying I/O failure.
    Io(std::io::Error),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "ledger io error: {e}"),
        }
    }
}

impl std::error::Error for StorageError {}
