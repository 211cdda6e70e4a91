// ledger/src/storage/mem.rs

//! In-memory ledger store.
//!
//! Keeps the ledger lines in a shared `Vec`. Clones share the same buffer,
//! so a test can hold a handle onto the store it gave the engine and
//! inspect what was written.

use std::sync::{Arc, Mutex};

use super::{LedgerStore, StorageError};

/// In-memory implementation of [`LedgerStore`].
#[derive(Clone, Debug, Default)]
pub struct MemLedger {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemLedger {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored lines.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copies out every stored line, in append order.
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LedgerStore for MemLedger {
    fn append(&mut self, line: &str) -> Result<(), StorageError> {
        self.lock().push(line.to_string());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.snapshot())
    }
}
