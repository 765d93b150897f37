//! The durable ledger of already-delivered item IDs.
//!
//! One ID per line, append-only. The whole file is loaded into a `HashSet`
//! at startup for O(1) membership checks; `add` appends a line and fsyncs
//! before returning, so "in the ledger" implies "the write is on disk".
//!
//! # Invariant direction
//!
//! An entry exists only if delivery occurred. The converse is allowed to
//! fail: a crash between delivery and `add` leaves the item pending, and it
//! will be delivered again on the next batch. That rare duplicate-delivery
//! window is accepted — the content is low-stakes and the alternative is a
//! transaction across two files.
//!
//! Growth is unbounded by design (mention volumes are small); [`Ledger::compact`]
//! exists for deployments that care.

use std::collections::HashSet;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::persistence::fsync::{atomic_replace, fsync_file};
use crate::types::ItemId;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// In-memory view of the delivered-IDs file.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    seen: HashSet<ItemId>,
}

impl Ledger {
    /// Opens the ledger, loading every recorded ID into memory.
    ///
    /// A missing file is an empty ledger, not an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut seen = HashSet::new();

        if path.exists() {
            let reader = BufReader::new(std::fs::File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                let id = line.trim();
                if !id.is_empty() {
                    seen.insert(ItemId::new(id));
                }
            }
        }

        info!(entries = seen.len(), path = %path.display(), "ledger loaded");
        Ok(Ledger { path, seen })
    }

    /// Returns true if the item has already been delivered.
    pub fn has(&self, id: &ItemId) -> bool {
        self.seen.contains(id)
    }

    /// Records an item as delivered, durably.
    ///
    /// The line is appended and fsynced before this returns; only then may
    /// the pipeline report the item as successfully delivered. Re-adding a
    /// known ID is a no-op.
    pub fn add(&mut self, id: &ItemId) -> Result<()> {
        if self.seen.contains(id) {
            return Ok(());
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", id.as_str())?;
        fsync_file(&file)?;

        self.seen.insert(id.clone());
        debug!(item_id = %id, "ledger entry written");
        Ok(())
    }

    /// Number of delivered IDs known to this ledger.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Rewrites the file from the in-memory set, dropping duplicate and blank
    /// lines accumulated across restarts. Optional; correctness never depends
    /// on it.
    pub fn compact(&self) -> Result<()> {
        let mut ids: Vec<&str> = self.seen.iter().map(ItemId::as_str).collect();
        ids.sort_unstable();
        let mut contents = ids.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        atomic_replace(&self.path, contents.as_bytes())?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_empty_ledger() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path().join("processed.txt")).unwrap();
        assert!(ledger.is_empty());
        assert!(!ledger.has(&ItemId::new("42")));
    }

    #[test]
    fn add_then_has() {
        let dir = tempdir().unwrap();
        let mut ledger = Ledger::open(dir.path().join("processed.txt")).unwrap();

        ledger.add(&ItemId::new("42")).unwrap();
        assert!(ledger.has(&ItemId::new("42")));
        assert!(!ledger.has(&ItemId::new("43")));
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("processed.txt");

        {
            let mut ledger = Ledger::open(&path).unwrap();
            ledger.add(&ItemId::new("1")).unwrap();
            ledger.add(&ItemId::new("2")).unwrap();
        }

        let reopened = Ledger::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.has(&ItemId::new("1")));
        assert!(reopened.has(&ItemId::new("2")));
    }

    #[test]
    fn re_adding_is_idempotent_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("processed.txt");

        let mut ledger = Ledger::open(&path).unwrap();
        ledger.add(&ItemId::new("7")).unwrap();
        ledger.add(&ItemId::new("7")).unwrap();
        ledger.add(&ItemId::new("7")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "7\n");
    }

    #[test]
    fn blank_lines_are_ignored_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("processed.txt");
        std::fs::write(&path, "1\n\n2\n   \n3\n").unwrap();

        let ledger = Ledger::open(&path).unwrap();
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn compact_dedups_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("processed.txt");
        // Duplicates as they might accumulate from pre-idempotency versions
        std::fs::write(&path, "2\n1\n2\n1\n").unwrap();

        let ledger = Ledger::open(&path).unwrap();
        ledger.compact().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1\n2\n");
        let reopened = Ledger::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
    }

    proptest! {
        /// Everything added before a reopen is still present after it.
        #[test]
        fn reopen_preserves_all_entries(
            ids in prop::collection::hash_set("[0-9]{1,18}", 0..40),
        ) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("processed.txt");

            {
                let mut ledger = Ledger::open(&path).unwrap();
                for id in &ids {
                    ledger.add(&ItemId::new(id.clone())).unwrap();
                }
            }

            let reopened = Ledger::open(&path).unwrap();
            prop_assert_eq!(reopened.len(), ids.len());
            for id in &ids {
                prop_assert!(reopened.has(&ItemId::new(id.clone())));
            }
        }
    }
}
