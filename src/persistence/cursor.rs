//! The last-seen cursor: a watermark bounding upstream re-scans.
//!
//! A single file holding the decimal string of the highest item ID the
//! listener has already scanned. Owned exclusively by the listener; the
//! delivery pipeline never reads it. Losing it costs a re-scan (the ledger
//! still prevents duplicate delivery), so the format stays trivially simple.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::persistence::fsync::atomic_replace;
use crate::types::ItemId;

/// Errors that can occur reading or writing the cursor file.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for cursor operations.
pub type Result<T> = std::result::Result<T, CursorError>;

/// Reads and writes the last-seen item ID.
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CursorStore { path: path.into() }
    }

    /// Returns the stored cursor, or `None` if the file is missing.
    ///
    /// An unreadable or empty file also reads as `None` — the listener then
    /// re-scans a little more than strictly necessary, which is harmless.
    pub fn load(&self) -> Result<Option<ItemId>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let trimmed = contents.trim();
                if trimmed.is_empty() {
                    warn!(path = %self.path.display(), "cursor file is empty, treating as unset");
                    Ok(None)
                } else {
                    Ok(Some(ItemId::new(trimmed)))
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Durably records `id` as the new cursor.
    ///
    /// Written atomically (temp + rename) so a crash mid-write leaves the
    /// previous cursor intact rather than a truncated file.
    pub fn store(&self, id: &ItemId) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        atomic_replace(&self.path, id.as_str().as_bytes())?;
        debug!(cursor = %id, "cursor updated");
        Ok(())
    }

    /// Advances the cursor only if `candidate` is beyond the stored value.
    ///
    /// Comparison is numeric when both IDs parse as u64 (platform snowflakes),
    /// else lexicographic. Keeps the cursor monotonically non-decreasing even
    /// if the upstream hands back items out of order.
    pub fn advance_to(&self, candidate: &ItemId) -> Result<()> {
        let should_store = match self.load()? {
            None => true,
            Some(current) => match (current.as_u64(), candidate.as_u64()) {
                (Some(cur), Some(cand)) => cand > cur,
                _ => candidate.as_str() > current.as_str(),
            },
        };
        if should_store {
            self.store(candidate)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_none() {
        let dir = tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("last_seen_id.txt"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn store_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("last_seen_id.txt"));

        store.store(&ItemId::new("123456789")).unwrap();
        assert_eq!(store.load().unwrap(), Some(ItemId::new("123456789")));
    }

    #[test]
    fn empty_file_loads_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last_seen_id.txt");
        std::fs::write(&path, "  \n").unwrap();

        let store = CursorStore::new(path);
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn advance_is_monotonic() {
        let dir = tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("last_seen_id.txt"));

        store.advance_to(&ItemId::new("100")).unwrap();
        store.advance_to(&ItemId::new("50")).unwrap();
        assert_eq!(store.load().unwrap(), Some(ItemId::new("100")));

        store.advance_to(&ItemId::new("200")).unwrap();
        assert_eq!(store.load().unwrap(), Some(ItemId::new("200")));
    }

    #[test]
    fn advance_compares_numerically_not_lexically() {
        let dir = tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("last_seen_id.txt"));

        // "9" > "100" lexicographically; numerically it is not
        store.store(&ItemId::new("100")).unwrap();
        store.advance_to(&ItemId::new("9")).unwrap();
        assert_eq!(store.load().unwrap(), Some(ItemId::new("100")));
    }
}
