//! Flat-file log of delivered interactions, for later analysis.
//!
//! Append-only CSV of `timestamp,item_id,subject,response`. This is an
//! analysis artifact, not pipeline bookkeeping: a failed write is logged
//! and swallowed so it can never affect delivery state.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::types::{ItemId, now_timestamp};

#[derive(Debug, Error)]
pub enum InteractionLogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, InteractionLogError>;

/// One delivered subject/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: String,
    pub item_id: ItemId,
    pub subject: String,
    pub response: String,
}

/// Appends interaction records to a CSV file.
#[derive(Debug, Clone)]
pub struct InteractionLog {
    path: PathBuf,
}

impl InteractionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        InteractionLog { path: path.into() }
    }

    /// Records one delivered interaction; errors are logged, never returned.
    pub fn record(&self, item_id: &ItemId, subject: &str, response: &str) {
        let record = InteractionRecord {
            timestamp: now_timestamp(),
            item_id: item_id.clone(),
            subject: subject.to_string(),
            response: response.to_string(),
        };
        if let Err(err) = self.append(&record) {
            warn!(error = %err, item_id = %item_id, "failed to log interaction");
        }
    }

    fn append(&self, record: &InteractionRecord) -> Result<()> {
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
            .from_writer(file);
        if !file_exists {
            writer.write_record(["timestamp", "item_id", "subject", "response"])?;
        }
        writer.serialize(record)?;
        writer.flush()?;
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
    fn record_appends_parseable_rows() {
        let dir = tempdir().unwrap();
        let log = InteractionLog::new(dir.path().join("interactions.csv"));

        log.record(&ItemId::new("42"), "gravity", "It pulls, dear. #ELI5");
        log.record(&ItemId::new("43"), "magnets", "They attract. #ELI5");

        let mut reader = csv::Reader::from_path(log.path()).unwrap();
        let rows: Vec<InteractionRecord> = reader
            .deserialize()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].item_id.as_str(), "42");
        assert_eq!(rows[1].subject, "magnets");
    }

    #[test]
    fn record_never_panics_on_bad_path() {
        // Unwritable location: the failure is swallowed
        let log = InteractionLog::new("/nonexistent-root/nope/interactions.csv");
        log.record(&ItemId::new("1"), "s", "r");
    }
}
