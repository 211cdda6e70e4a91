// ledger/src/storage/file.rs

//! File-backed ledger store.
//!
//! Persists the ledger as a plain text file, one canonical block string
//! per line. The file is opened in append mode and never rewritten, so an
//! existing ledger survives restarts and replays byte-for-byte.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use super::{LedgerStore, StorageError};

/// Configuration for [`FileLedger`].
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Filesystem path of the ledger file.
    pub path: String,
    /// Whether to create the file (and missing parent directories) if it
    /// does not yet exist.
    pub create_if_missing: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "data/ledger.txt".to_string(),
            create_if_missing: true,
        }
    }
}

/// Append-only file implementation of [`LedgerStore`].
pub struct FileLedger {
    file: File,
    path: String,
}

impl FileLedger {
    /// Opens (or creates) the ledger file.
    ///
    /// An error here is a startup-fatal condition for a node: without the
    /// ledger file there is nothing to replay and nowhere to persist.
    pub fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        if config.create_if_missing {
            if let Some(parent) = Path::new(&config.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let file = OpenOptions::new()
            .append(true)
            .create(config.create_if_missing)
            .open(&config.path)?;

        Ok(Self {
            file,
            path: config.path.clone(),
        })
    }

    /// Path this ledger writes to.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl LedgerStore for FileLedger {
    fn append(&mut self, line: &str) -> Result<(), StorageError> {
        writeln!(self.file, "{line}")?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<String>, StorageError> {
        let content = std::fs::read_to_string(&self.path)?;
        Ok(content
            .lines()
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_config(dir: &TempDir) -> StorageConfig {
        StorageConfig {
            path: dir.path().join("ledger.txt").to_string_lossy().into_owned(),
            create_if_missing: true,
        }
    }

    #[test]
    fn appended_lines_survive_reopening() {
        let dir = TempDir::new().expect("create temp dir");
        let config = temp_config(&dir);

        let mut ledger = FileLedger::open(&config).expect("open ledger");
        ledger.append("one").expect("append");
        ledger.append("two").expect("append");
        drop(ledger);

        let mut reopened = FileLedger::open(&config).expect("reopen ledger");
        assert_eq!(reopened.read_all().expect("read"), vec!["one", "two"]);

        // Reopening appends, it never truncates.
        reopened.append("three").expect("append");
        assert_eq!(reopened.read_all().expect("read").len(), 3);
    }

    #[test]
    fn missing_file_without_create_is_an_error() {
        let dir = TempDir::new().expect("create temp dir");
        let config = StorageConfig {
            create_if_missing: false,
            ..temp_config(&dir)
        };
        assert!(FileLedger::open(&config).is_err());
    }

    #[test]
    fn blank_lines_are_skipped_on_read() {
        let dir = TempDir::new().expect("create temp dir");
        let config = temp_config(&dir);
        std::fs::write(&config.path, "one\n\ntwo\n").expect("seed file");

        let ledger = FileLedger::open(&config).expect("open ledger");
        assert_eq!(ledger.read_all().expect("read"), vec!["one", "two"]);
    }

    #[test]
    fn parent_directories_are_created_on_demand() {
        let dir = TempDir::new().expect("create temp dir");
        let config = StorageConfig {
            path: dir
                .path()
                .join("nested/deeper/ledger.txt")
                .to_string_lossy()
                .into_owned(),
            create_if_missing: true,
        };

        let mut ledger = FileLedger::open(&config).expect("open ledger");
        ledger.append("line").expect("append");
        assert_eq!(ledger.read_all().expect("read"), vec!["line"]);
    }
}
