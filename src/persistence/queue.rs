//! The CSV-backed work queue of pending mentions.
//!
//! One row per [`MentionRecord`], header row first. The listener appends;
//! the delivery pipeline reads oldest-first batches and removes rows whose
//! replies have been delivered.
//!
//! # Consistency
//!
//! `append` and `remove_by_ids` are individually durable, but a removal is a
//! full read-filter-rewrite and is NOT atomic with respect to a concurrent
//! append: an append racing the rewrite may be silently dropped. The queue is
//! a best-effort pending-work buffer, not a durable log — callers that need
//! the stronger guarantee don't exist in this system, and the dedup ledger
//! (not the queue) is what prevents duplicate delivery.
//!
//! A reader that interleaves with a partially-written append may see a
//! malformed row; malformed rows are skipped with a warning, never fatal.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::persistence::fsync::{atomic_replace, fsync_file};
use crate::types::{ItemId, MentionRecord};

/// Errors that can occur during queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// CSV serialization error on the write path.
    ///
    /// Read-path CSV errors never surface here; malformed rows are skipped.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

const HEADER: [&str; 5] = ["timestamp", "item_id", "author_id", "author_username", "text"];

/// The pending-mentions queue, backed by a single CSV file.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    path: PathBuf,
}

impl WorkQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        WorkQueue { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record, creating the file (with header) if needed.
    pub fn append(&self, record: &MentionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let file_exists = self.path.exists();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&file);
        if !file_exists {
            writer.write_record(HEADER)?;
        }
        writer.serialize(record)?;
        writer.flush()?;
        drop(writer);
        fsync_file(&file)?;

        debug!(item_id = %record.item_id, "appended mention to queue");
        Ok(())
    }

    /// Reads every parseable record currently in the queue, in file order.
    ///
    /// Malformed rows (torn appends, hand edits) are logged and skipped.
    /// A missing queue file reads as empty.
    pub fn read_all(&self) -> Result<Vec<MentionRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;

        let mut records = Vec::new();
        for row in reader.deserialize::<MentionRecord>() {
            match row {
                Ok(record) => records.push(record),
                Err(err) => warn!(error = %err, "skipping malformed queue row"),
            }
        }
        Ok(records)
    }

    /// Returns up to `n` records, ordered by timestamp ascending.
    ///
    /// Timestamps come from a single formatter, so lexicographic comparison
    /// is chronological; ties keep their original file order (stable sort).
    pub fn peek_oldest(&self, n: usize) -> Result<Vec<MentionRecord>> {
        let mut records = self.read_all()?;
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        records.truncate(n);
        Ok(records)
    }

    /// Removes every record whose `item_id` is in `ids`.
    ///
    /// Full read-filter-rewrite with header intact, persisted via atomic
    /// rename. See the module docs for the documented race with `append`.
    pub fn remove_by_ids(&self, ids: &HashSet<ItemId>) -> Result<()> {
        if ids.is_empty() || !self.path.exists() {
            return Ok(());
        }

        let remaining: Vec<MentionRecord> = self
            .read_all()?
            .into_iter()
            .filter(|record| !ids.contains(&record.item_id))
            .collect();

        let mut buf = Vec::new();
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(&mut buf);
            writer.write_record(HEADER)?;
            for record in &remaining {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        atomic_replace(&self.path, &buf)?;

        debug!(removed = ids.len(), remaining = remaining.len(), "rewrote queue");
        Ok(())
    }

    /// Returns true if any parseable record is pending.
    pub fn has_pending(&self) -> Result<bool> {
        Ok(!self.read_all()?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AuthorId;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn record(timestamp: &str, id: &str, text: &str) -> MentionRecord {
        MentionRecord {
            timestamp: timestamp.to_string(),
            item_id: ItemId::new(id),
            author_id: AuthorId::new("7"),
            author_username: "someone".to_string(),
            text: text.to_string(),
        }
    }

    fn queue_in(dir: &tempfile::TempDir) -> WorkQueue {
        WorkQueue::new(dir.path().join("mentions.csv"))
    }

    #[test]
    fn empty_queue_reads_empty() {
        let dir = tempdir().unwrap();
        let queue = queue_in(&dir);
        assert_eq!(queue.read_all().unwrap(), Vec::new());
        assert!(!queue.has_pending().unwrap());
    }

    #[test]
    fn append_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let queue = queue_in(&dir);

        let original = record(
            "2024-01-01T00:00:00",
            "42",
            "text with \"quotes\", commas, and\ttabs",
        );
        queue.append(&original).unwrap();

        let read_back = queue.read_all().unwrap();
        assert_eq!(read_back, vec![original]);
    }

    #[test]
    fn peek_oldest_orders_by_timestamp_not_file_order() {
        let dir = tempdir().unwrap();
        let queue = queue_in(&dir);

        // Inserted out of order on purpose
        queue.append(&record("2024-01-03T00:00:00", "3", "t3")).unwrap();
        queue.append(&record("2024-01-01T00:00:00", "1", "t1")).unwrap();
        queue.append(&record("2024-01-02T00:00:00", "2", "t2")).unwrap();

        let oldest = queue.peek_oldest(2).unwrap();
        assert_eq!(oldest.len(), 2);
        assert_eq!(oldest[0].item_id.as_str(), "1");
        assert_eq!(oldest[1].item_id.as_str(), "2");
    }

    #[test]
    fn peek_oldest_ties_keep_file_order() {
        let dir = tempdir().unwrap();
        let queue = queue_in(&dir);

        queue.append(&record("2024-01-01T00:00:00", "a", "first")).unwrap();
        queue.append(&record("2024-01-01T00:00:00", "b", "second")).unwrap();

        let oldest = queue.peek_oldest(2).unwrap();
        assert_eq!(oldest[0].item_id.as_str(), "a");
        assert_eq!(oldest[1].item_id.as_str(), "b");
    }

    #[test]
    fn peek_oldest_on_empty_queue_returns_empty() {
        let dir = tempdir().unwrap();
        let queue = queue_in(&dir);
        assert_eq!(queue.peek_oldest(10).unwrap(), Vec::new());
    }

    #[test]
    fn remove_by_ids_keeps_header_and_remainder() {
        let dir = tempdir().unwrap();
        let queue = queue_in(&dir);

        queue.append(&record("2024-01-01T00:00:00", "1", "t1")).unwrap();
        queue.append(&record("2024-01-02T00:00:00", "2", "t2")).unwrap();
        queue.append(&record("2024-01-03T00:00:00", "3", "t3")).unwrap();

        let ids: HashSet<ItemId> = [ItemId::new("1"), ItemId::new("3")].into_iter().collect();
        queue.remove_by_ids(&ids).unwrap();

        let remaining = queue.read_all().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].item_id.as_str(), "2");

        // Header survives the rewrite, so a fresh append still parses
        queue.append(&record("2024-01-04T00:00:00", "4", "t4")).unwrap();
        assert_eq!(queue.read_all().unwrap().len(), 2);
    }

    #[test]
    fn remove_with_empty_id_set_is_noop() {
        let dir = tempdir().unwrap();
        let queue = queue_in(&dir);

        queue.append(&record("2024-01-01T00:00:00", "1", "t1")).unwrap();
        queue.remove_by_ids(&HashSet::new()).unwrap();
        assert_eq!(queue.read_all().unwrap().len(), 1);
    }

    #[test]
    fn malformed_row_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let queue = queue_in(&dir);

        queue.append(&record("2024-01-01T00:00:00", "1", "good")).unwrap();

        // Simulate a torn append: a row with too few fields
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(queue.path())
            .unwrap();
        writeln!(file, "2024-01-02T00:00:00,2").unwrap();
        drop(file);

        queue.append(&record("2024-01-03T00:00:00", "3", "also good")).unwrap();

        let records = queue.read_all().unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    proptest! {
        /// Any text content survives the append/read round trip intact.
        #[test]
        fn round_trip_preserves_arbitrary_text(
            text in "[ -~]{0,200}",
            username in "[a-zA-Z0-9_]{1,15}",
        ) {
            let dir = tempdir().unwrap();
            let queue = queue_in(&dir);

            let original = MentionRecord {
                timestamp: "2024-06-01T12:00:00".to_string(),
                item_id: ItemId::new("900"),
                author_id: AuthorId::new("901"),
                author_username: username,
                text,
            };
            queue.append(&original).unwrap();

            let read_back = queue.read_all().unwrap();
            prop_assert_eq!(read_back, vec![original]);
        }

        /// peek_oldest(n) returns exactly the n smallest timestamps, ascending.
        #[test]
        fn peek_oldest_returns_n_smallest(
            mut stamps in prop::collection::vec(946684800i64..1893456000, 1..20),
            n in 1usize..10,
        ) {
            let dir = tempdir().unwrap();
            let queue = queue_in(&dir);

            for (i, secs) in stamps.iter().enumerate() {
                let ts = chrono::DateTime::from_timestamp(*secs, 0)
                    .unwrap()
                    .format("%Y-%m-%dT%H:%M:%S")
                    .to_string();
                queue.append(&record(&ts, &format!("{i}"), "x")).unwrap();
            }

            let peeked = queue.peek_oldest(n).unwrap();

            stamps.sort_unstable();
            let expected: Vec<String> = stamps
                .iter()
                .take(n)
                .map(|secs| {
                    chrono::DateTime::from_timestamp(*secs, 0)
                        .unwrap()
                        .format("%Y-%m-%dT%H:%M:%S")
                        .to_string()
                })
                .collect();
            let actual: Vec<String> = peeked.into_iter().map(|r| r.timestamp).collect();
            prop_assert_eq!(actual, expected);
        }

        /// Removing a subset never touches records outside the subset.
        #[test]
        fn remove_is_exact(
            count in 1usize..15,
            remove_mask in prop::collection::vec(any::<bool>(), 15),
        ) {
            let dir = tempdir().unwrap();
            let queue = queue_in(&dir);

            for i in 0..count {
                queue
                    .append(&record(&format!("2024-01-01T00:00:{i:02}"), &format!("{i}"), "x"))
                    .unwrap();
            }

            let to_remove: HashSet<ItemId> = (0..count)
                .filter(|i| remove_mask[*i])
                .map(|i| ItemId::new(format!("{i}")))
                .collect();
            queue.remove_by_ids(&to_remove).unwrap();

            let remaining: HashSet<ItemId> = queue
                .read_all()
                .unwrap()
                .into_iter()
                .map(|r| r.item_id)
                .collect();
            let expected: HashSet<ItemId> = (0..count)
                .filter(|i| !remove_mask[*i])
                .map(|i| ItemId::new(format!("{i}")))
                .collect();
            prop_assert_eq!(remaining, expected);
        }
    }
}
