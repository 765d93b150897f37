//! The loop driver around the batch engine.
//!
//! Fixed-delay repetition, retried forever: the queue is eventually drained
//! no matter how many batches partially fail. Storage errors don't kill the
//! loop either — they get a longer pause and the next cycle tries again,
//! matching the "eventually delivered" posture of the whole system.

use std::time::Duration;

use tracing::{error, info};

use crate::deliver::Deliver;
use crate::generate::Generate;

use super::engine::{BatchOutcome, Engine};

/// Delay tiers between batch runs.
#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
    /// Pause after a normal cycle.
    pub interval: Duration,

    /// Longer pause after a storage error.
    pub error_delay: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            interval: Duration::from_secs(30),
            error_delay: Duration::from_secs(60),
        }
    }
}

/// Runs batches forever with a fixed inter-batch delay.
///
/// Cancellation happens at the task level (the caller drops or aborts the
/// future); between batches is the graceful point, mid-item degrades to
/// at-least-once redelivery.
pub async fn process_loop<G: Generate, D: Deliver>(engine: &mut Engine<G, D>, config: LoopConfig) {
    info!(interval_secs = config.interval.as_secs(), "starting processing loop");
    loop {
        match engine.run_batch().await {
            Ok(BatchOutcome::Skipped) | Ok(BatchOutcome::Ran(_)) => {
                tokio::time::sleep(config.interval).await;
            }
            Err(err) => {
                error!(error = %err, "batch failed, backing off");
                tokio::time::sleep(config.error_delay).await;
            }
        }
    }
}
