//! The delivery pipeline: one batch run over the oldest pending mentions.
//!
//! Per batch: take the process lock (or skip the cycle), then for each record
//! oldest-first:
//!
//! ```text
//! ledger check  — already delivered? remove from queue, next record
//! extract topic — unparseable? warn, next record (stays pending)
//! generate      — chain failed? use the deterministic apology, continue
//! deliver       — success: ledger write, queue remove, interaction log
//!                 rate limited: back off, stop the batch, item stays pending
//!                 other failure: item stays pending, next record
//! ```
//!
//! Per-item failures are isolated: one bad item never blocks or corrupts the
//! rest of the batch. The lock guard releases on every exit path, including
//! early returns and panics.
//!
//! The driver reruns batches forever with a fixed delay — an intentional
//! eventually-delivered design; do not bolt exponential backoff onto it.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{info, warn};

use crate::deliver::{Deliver, DeliverError, PreparedReply};
use crate::generate::{Generate, apology};
use crate::persistence::{InteractionLog, Ledger, PipelineLock, WorkQueue};
use crate::persistence::{ledger, lock, queue};
use crate::ratelimit::BackoffPolicy;

use super::topic::TopicExtractor;

/// Errors that abort a whole batch (storage problems, not item problems).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Queue(#[from] queue::QueueError),

    #[error(transparent)]
    Ledger(#[from] ledger::LedgerError),

    #[error(transparent)]
    Lock(#[from] lock::LockError),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Tunables for one batch run.
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    /// Maximum records examined per batch; bounds run latency.
    pub max_items: usize,

    /// Length budget handed to generation.
    pub max_reply_length: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            max_items: 10,
            max_reply_length: crate::generate::DEFAULT_MAX_LENGTH,
        }
    }
}

/// What one batch run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Another instance holds the lock; nothing was done this cycle.
    Skipped,

    /// A batch ran to completion (or stopped early on a rate limit).
    Ran(BatchReport),
}

/// Per-batch counters, plus whether pending work remains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub examined: usize,
    pub delivered: usize,
    pub already_delivered: usize,
    pub unparseable: usize,
    pub failed: usize,
    pub more_pending: bool,
}

/// The batch processor. Owns the stores and the collaborators.
pub struct Engine<G, D> {
    queue: WorkQueue,
    ledger: Ledger,
    lock: PipelineLock,
    extractor: TopicExtractor,
    generator: G,
    delivery: D,
    interactions: InteractionLog,
    backoff: BackoffPolicy,
    config: BatchConfig,
}

impl<G: Generate, D: Deliver> Engine<G, D> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: WorkQueue,
        ledger: Ledger,
        lock: PipelineLock,
        extractor: TopicExtractor,
        generator: G,
        delivery: D,
        interactions: InteractionLog,
        backoff: BackoffPolicy,
        config: BatchConfig,
    ) -> Self {
        Engine {
            queue,
            ledger,
            lock,
            extractor,
            generator,
            delivery,
            interactions,
            backoff,
            config,
        }
    }

    /// Runs one batch. See the module docs for the state machine.
    pub async fn run_batch(&mut self) -> Result<BatchOutcome> {
        let Some(_guard) = self.lock.try_acquire()? else {
            // Normal contention, not an error: another instance is working.
            info!("pipeline lock held elsewhere, skipping this cycle");
            return Ok(BatchOutcome::Skipped);
        };

        let batch = self.queue.peek_oldest(self.config.max_items)?;
        let mut report = BatchReport::default();

        for record in &batch {
            report.examined += 1;

            if self.ledger.has(&record.item_id) {
                // Delivered on a previous run that crashed before removal;
                // finish the bookkeeping and move on.
                warn!(item_id = %record.item_id, "already in ledger, removing from queue");
                self.remove_one(record)?;
                report.already_delivered += 1;
                continue;
            }

            let Some(subject) = self.extractor.extract(&record.text) else {
                warn!(item_id = %record.item_id, text = %record.text, "could not extract topic");
                report.unparseable += 1;
                continue;
            };

            let reply_text = match self
                .generator
                .generate(&subject, self.config.max_reply_length)
                .await
            {
                Ok(text) => text,
                Err(err) => {
                    warn!(item_id = %record.item_id, subject = %subject, error = %err, "generation failed, using apology");
                    apology(&subject)
                }
            };

            let prepared = PreparedReply {
                item_id: &record.item_id,
                subject: &subject,
                text: &reply_text,
                author_username: &record.author_username,
            };

            match self.delivery.deliver(prepared).await {
                Ok(()) => {
                    // Ledger first: once this line is on disk the item can
                    // never be delivered again, even if removal crashes.
                    self.ledger.add(&record.item_id)?;
                    self.remove_one(record)?;
                    self.interactions.record(&record.item_id, &subject, &reply_text);
                    report.delivered += 1;
                    info!(item_id = %record.item_id, subject = %subject, "reply delivered");
                }
                Err(DeliverError::RateLimited { signal }) => {
                    let wait = self.backoff.seconds_until_reset(signal.as_ref());
                    warn!(item_id = %record.item_id, wait_secs = wait, "delivery rate limited, stopping batch");
                    self.backoff.await_reset(wait).await;
                    report.failed += 1;
                    break;
                }
                Err(err) => {
                    // Item stays pending; the next batch retries it.
                    warn!(item_id = %record.item_id, error = %err, "delivery failed, item stays pending");
                    report.failed += 1;
                }
            }
        }

        report.more_pending = self.queue.has_pending()?;
        info!(
            examined = report.examined,
            delivered = report.delivered,
            failed = report.failed,
            more_pending = report.more_pending,
            "batch complete"
        );
        Ok(BatchOutcome::Ran(report))
    }

    fn remove_one(&self, record: &crate::types::MentionRecord) -> Result<()> {
        let ids: HashSet<_> = [record.item_id.clone()].into_iter().collect();
        self.queue.remove_by_ids(&ids)?;
        Ok(())
    }

    /// The queue this engine drains (used by status reporting and tests).
    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }
}
