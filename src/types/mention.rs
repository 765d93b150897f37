//! Mention records: the unit of work flowing through the pipeline.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::ids::{AuthorId, ItemId};

/// A queued mention awaiting a reply.
///
/// Created by the listener when a message matches the trigger pattern,
/// persisted in the work queue CSV, and removed once the reply has been
/// delivered. Immutable after creation.
///
/// The `timestamp` is the *ingestion* time in ISO-8601, produced by a single
/// formatter so that lexicographic comparison orders records chronologically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionRecord {
    pub timestamp: String,
    pub item_id: ItemId,
    pub author_id: AuthorId,
    pub author_username: String,
    pub text: String,
}

impl MentionRecord {
    /// Creates a record stamped with the current time.
    ///
    /// Newlines in the text are flattened to spaces so a record always
    /// occupies a predictable shape when eyeballed in the queue file; the
    /// CSV layer would escape them correctly either way.
    pub fn new(
        item_id: ItemId,
        author_id: AuthorId,
        author_username: impl Into<String>,
        text: &str,
    ) -> Self {
        MentionRecord {
            timestamp: now_timestamp(),
            item_id,
            author_id,
            author_username: author_username.into(),
            text: text.replace(['\n', '\r'], " "),
        }
    }
}

/// A raw mention as fetched from the platform, before trigger filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamMention {
    pub id: ItemId,
    pub author_id: AuthorId,
    pub author_username: Option<String>,
    pub text: String,
}

/// The single timestamp formatter for queue records.
///
/// Seconds precision is enough to order batches; ties fall back to file
/// order, which preserves arrival order within a second.
pub fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}
