//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different ID types (e.g., using an
//! AuthorId where an ItemId is expected) and make the code more self-documenting.
//!
//! Platform message IDs are decimal strings in practice (Twitter snowflakes,
//! Discord snowflakes), but nothing here assumes numeric content except
//! [`ItemId::as_u64`], which callers use for cursor comparisons.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The platform-assigned ID of a mention (tweet ID or Discord message ID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(s: impl Into<String>) -> Self {
        ItemId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the ID as a u64 for ordering against the cursor.
    ///
    /// Returns `None` for non-numeric IDs; callers fall back to string
    /// comparison in that case.
    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

/// The platform-assigned ID of a mention's author.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(pub String);

impl AuthorId {
    pub fn new(s: impl Into<String>) -> Self {
        AuthorId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AuthorId {
    fn from(s: String) -> Self {
        AuthorId(s)
    }
}
