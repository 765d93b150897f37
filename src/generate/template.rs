//! The dataset/template generation strategy.
//!
//! Last resort before the apology: looks the subject up in the examples
//! dataset (a CSV of `term,explanation` rows) and falls back to a
//! deterministic condescending template when no example matches. Never
//! fails, which is exactly why it sits at the end of the chain.

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use super::format::format_response;
use super::Result;

/// One `term,explanation` row of the examples dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct ExampleRow {
    pub term: String,
    pub explanation: String,
}

/// Offline generation from the examples dataset plus a fixed template.
#[derive(Debug, Clone, Default)]
pub struct DatasetTemplate {
    examples: Vec<ExampleRow>,
}

impl DatasetTemplate {
    /// Loads the dataset; a missing or unreadable file yields an empty
    /// dataset (template-only operation) rather than an error, matching the
    /// best-effort role of this strategy.
    pub fn load(path: &Path) -> Self {
        let examples = match Self::read_examples(path) {
            Ok(examples) => {
                info!(count = examples.len(), path = %path.display(), "examples dataset loaded");
                examples
            }
            Err(err) => {
                warn!(error = %err, path = %path.display(), "examples dataset unavailable, using template only");
                Vec::new()
            }
        };
        DatasetTemplate { examples }
    }

    pub fn from_examples(examples: Vec<ExampleRow>) -> Self {
        DatasetTemplate { examples }
    }

    pub fn example_count(&self) -> usize {
        self.examples.len()
    }

    fn read_examples(path: &Path) -> std::result::Result<Vec<ExampleRow>, csv::Error> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let mut examples = Vec::new();
        for row in reader.deserialize::<ExampleRow>() {
            match row {
                Ok(example) => examples.push(example),
                Err(err) => warn!(error = %err, "skipping malformed dataset row"),
            }
        }
        Ok(examples)
    }

    pub(super) async fn generate(&self, subject: &str, max_length: usize) -> Result<String> {
        let needle = subject.to_lowercase();
        let canned = self
            .examples
            .iter()
            .find(|example| example.term.to_lowercase() == needle)
            .map(|example| example.explanation.clone());

        let text = canned.unwrap_or_else(|| {
            format!(
                "Oh, '{subject}'? Adorable that you had to ask. Think of it as the thing \
                 everyone else already understands, working exactly the way you'd expect."
            )
        });

        Ok(format_response(&text, max_length))
    }
}
