//! Core domain types for the mention bot.

pub mod ids;
pub mod mention;

// Re-export commonly used types at the module level
pub use ids::{AuthorId, ItemId};
pub use mention::{MentionRecord, UpstreamMention, now_timestamp};
