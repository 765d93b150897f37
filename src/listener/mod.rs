//! Mention ingestion: from the platform into the work queue.
//!
//! The platform itself sits behind [`MentionSource`]; the ingest step is the
//! same for every platform:
//!
//! 1. Read the cursor and fetch items past it (rate-limit aware).
//! 2. Keep only items matching the trigger (bot handle plus marker hashtag).
//! 3. Drop items already seen this run (bounded in-memory set).
//! 4. Append survivors to the work queue; advance the cursor to the highest
//!    fetched ID.
//!
//! The cursor only bounds re-scanning. Dedup *correctness* lives in the
//! delivery pipeline's ledger; re-ingesting an old mention here wastes a
//! queue row, nothing more.

pub mod twitter;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::persistence::{CursorStore, WorkQueue, cursor, queue};
use crate::pipeline::topic::contains_token_ci;
use crate::ratelimit::{BackoffPolicy, RateLimitSignal};
use crate::types::{ItemId, MentionRecord, UpstreamMention};

pub use twitter::TwitterMentionSource;

/// Errors a mention source can produce.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The request never completed (connect failure, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The platform answered with a non-success status.
    #[error("upstream returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The platform reported "too many requests".
    #[error("rate limited")]
    RateLimited { signal: Option<RateLimitSignal> },

    /// The platform answered 200 with a body we cannot use.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Result type for mention sources.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Errors that abort an ingest pass (storage problems, not platform ones).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Queue(#[from] queue::QueueError),

    #[error(transparent)]
    Cursor(#[from] cursor::CursorError),
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// The platform listener contract (external collaborator).
#[async_trait]
pub trait MentionSource: Send + Sync {
    /// Fetches mentions newer than `since`, oldest data allowed in any order.
    async fn fetch_new(&self, since: Option<&ItemId>) -> SourceResult<Vec<UpstreamMention>>;
}

/// Decides whether a message is addressed to the bot.
///
/// A valid trigger mentions the handle (either as `@handle` text or as a raw
/// platform token `<@id>`) *and* carries the marker hashtag.
#[derive(Debug, Clone)]
pub struct TriggerFilter {
    handle_token: String,
    marker_token: String,
}

impl TriggerFilter {
    pub fn new(handle: impl Into<String>, marker: impl Into<String>) -> Self {
        TriggerFilter {
            handle_token: format!("@{}", handle.into()),
            marker_token: format!("#{}", marker.into()),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        let mentioned = contains_token_ci(text, &self.handle_token) || text.contains("<@");
        mentioned && contains_token_ci(text, &self.marker_token)
    }
}

/// Bounded set of item IDs seen this run.
///
/// Once `cap` entries accumulate, the oldest half is evicted. Purely an
/// in-memory courtesy to avoid hammering the queue file; restart resets it.
#[derive(Debug)]
pub struct SeenSet {
    cap: usize,
    order: std::collections::VecDeque<ItemId>,
    members: std::collections::HashSet<ItemId>,
}

impl SeenSet {
    pub fn new(cap: usize) -> Self {
        SeenSet {
            cap: cap.max(2),
            order: std::collections::VecDeque::new(),
            members: std::collections::HashSet::new(),
        }
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.members.contains(id)
    }

    pub fn insert(&mut self, id: ItemId) {
        if self.members.insert(id.clone()) {
            self.order.push_back(id);
        }
        if self.order.len() > self.cap {
            let keep_from = self.order.len() - self.cap / 2;
            for evicted in self.order.drain(..keep_from) {
                self.members.remove(&evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// What one ingest pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub fetched: usize,
    pub queued: usize,
    pub rate_limited: bool,
}

/// Pulls mentions from a source into the work queue.
pub struct Ingestor<S> {
    source: S,
    queue: WorkQueue,
    cursor: CursorStore,
    filter: TriggerFilter,
    seen: SeenSet,
    backoff: BackoffPolicy,
}

impl<S: MentionSource> Ingestor<S> {
    pub fn new(
        source: S,
        queue: WorkQueue,
        cursor: CursorStore,
        filter: TriggerFilter,
        seen_cap: usize,
        backoff: BackoffPolicy,
    ) -> Self {
        Ingestor {
            source,
            queue,
            cursor,
            filter,
            seen: SeenSet::new(seen_cap),
            backoff,
        }
    }

    /// One fetch-and-append pass.
    ///
    /// A rate-limited fetch waits out the reset and returns without fetching
    /// again; the next cycle retries. Other upstream failures are logged and
    /// yield an empty pass — only storage failures surface as errors.
    pub async fn run_once(&mut self) -> Result<IngestReport> {
        let since = self.cursor.load()?;
        debug!(cursor = ?since.as_ref().map(ItemId::as_str), "fetching mentions");

        let items = match self.source.fetch_new(since.as_ref()).await {
            Ok(items) => items,
            Err(SourceError::RateLimited { signal }) => {
                let wait = self.backoff.seconds_until_reset(signal.as_ref());
                warn!(wait_secs = wait, "mention fetch rate limited");
                self.backoff.await_reset(wait).await;
                return Ok(IngestReport {
                    rate_limited: true,
                    ..IngestReport::default()
                });
            }
            Err(err) => {
                warn!(error = %err, "mention fetch failed");
                return Ok(IngestReport::default());
            }
        };

        let mut report = IngestReport {
            fetched: items.len(),
            ..IngestReport::default()
        };
        let mut max_id: Option<ItemId> = None;

        for item in items {
            if max_id
                .as_ref()
                .is_none_or(|current| id_newer(&item.id, current))
            {
                max_id = Some(item.id.clone());
            }

            if self.seen.contains(&item.id) {
                continue;
            }
            if !self.filter.matches(&item.text) {
                debug!(item_id = %item.id, "not a trigger mention, ignoring");
                continue;
            }

            let record = MentionRecord::new(
                item.id.clone(),
                item.author_id,
                item.author_username.unwrap_or_else(|| "unknown".to_string()),
                &item.text,
            );
            self.queue.append(&record)?;
            self.seen.insert(item.id);
            report.queued += 1;
        }

        if let Some(id) = &max_id {
            self.cursor.advance_to(id)?;
        }

        info!(fetched = report.fetched, queued = report.queued, "ingest pass complete");
        Ok(report)
    }

    /// Fetches forever with a fixed delay between cycles.
    ///
    /// Rate-limit waits happen inside [`run_once`](Self::run_once), which
    /// makes the effective cycle length adaptive to upstream signals.
    pub async fn run_forever(&mut self, interval: std::time::Duration) {
        loop {
            if let Err(err) = self.run_once().await {
                warn!(error = %err, "ingest pass failed");
            }
            tokio::time::sleep(interval).await;
        }
    }
}

/// Snowflake-aware ID ordering: numeric when both sides parse, else
/// lexicographic (mirrors the cursor store's comparison).
fn id_newer(candidate: &ItemId, current: &ItemId) -> bool {
    match (candidate.as_u64(), current.as_u64()) {
        (Some(cand), Some(cur)) => cand > cur,
        _ => candidate.as_str() > current.as_str(),
    }
}
