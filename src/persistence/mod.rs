//! Durable state for the pipeline: work queue, ledger, cursor, lock, and
//! the interaction log.
//!
//! The queue and ledger files are the only shared mutable resources in the
//! system; every mutation goes through [`WorkQueue`] and [`Ledger`]. The
//! cursor belongs to the listener alone, and the lock arbitrates which
//! pipeline instance gets to run a batch.

pub mod cursor;
pub mod fsync;
pub mod interactions;
pub mod ledger;
pub mod lock;
pub mod queue;

pub use cursor::CursorStore;
pub use interactions::InteractionLog;
pub use ledger::Ledger;
pub use lock::{LockGuard, PipelineLock};
pub use queue::WorkQueue;
