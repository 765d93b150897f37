//! The mention delivery pipeline: topic extraction, the batch engine, and
//! the loop driver.

pub mod engine;
pub mod runner;
pub mod topic;

pub use engine::{BatchConfig, BatchOutcome, BatchReport, Engine, PipelineError};
pub use runner::{LoopConfig, process_loop};
pub use topic::TopicExtractor;
