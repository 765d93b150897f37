//! Reply generation: an ordered chain of strategies behind one contract.
//!
//! The pipeline only sees [`Generate`]. Concrete strategies are tried in
//! order by [`GeneratorStack`] — remote LLM service first, then the offline
//! dataset/template — and the first success wins. When the whole chain fails
//! the *caller* substitutes the deterministic [`format::apology`] text, so a
//! broken upstream degrades the replies without ever stalling the batch.
//!
//! Every strategy returns marker-terminated text (see [`format`]); a
//! strategy that cannot produce that returns an error rather than partial
//! garbage.

pub mod format;
pub mod remote;
pub mod template;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

pub use format::{COMPLETION_MARKER, DEFAULT_MAX_LENGTH, apology, format_response};
pub use remote::RemoteLlm;
pub use template::{DatasetTemplate, ExampleRow};

/// Errors a generation strategy can produce.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The request never completed (connect failure, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("upstream returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The service answered 200 with a body we cannot use.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Every strategy in the chain failed.
    #[error("all {attempted} generation strategies failed")]
    Exhausted { attempted: usize },
}

/// Result type for generation.
pub type Result<T> = std::result::Result<T, GenerateError>;

/// The generation contract the pipeline depends on.
///
/// Implementations must return text ending with [`COMPLETION_MARKER`], or an
/// error — never silently-truncated or marker-less output.
#[async_trait]
pub trait Generate: Send + Sync {
    /// Short name for log lines.
    fn name(&self) -> &'static str;

    async fn generate(&self, subject: &str, max_length: usize) -> Result<String>;
}

#[async_trait]
impl Generate for RemoteLlm {
    fn name(&self) -> &'static str {
        "remote-llm"
    }

    async fn generate(&self, subject: &str, max_length: usize) -> Result<String> {
        RemoteLlm::generate(self, subject, max_length).await
    }
}

#[async_trait]
impl Generate for DatasetTemplate {
    fn name(&self) -> &'static str {
        "dataset-template"
    }

    async fn generate(&self, subject: &str, max_length: usize) -> Result<String> {
        DatasetTemplate::generate(self, subject, max_length).await
    }
}

/// An ordered fallback chain of generation strategies.
pub struct GeneratorStack {
    strategies: Vec<Box<dyn Generate>>,
}

impl GeneratorStack {
    pub fn new(strategies: Vec<Box<dyn Generate>>) -> Self {
        GeneratorStack { strategies }
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[async_trait]
impl Generate for GeneratorStack {
    fn name(&self) -> &'static str {
        "stack"
    }

    /// Tries each strategy in order; the first success is returned.
    async fn generate(&self, subject: &str, max_length: usize) -> Result<String> {
        for strategy in &self.strategies {
            match strategy.generate(subject, max_length).await {
                Ok(text) => {
                    debug!(strategy = strategy.name(), subject, "generation succeeded");
                    return Ok(text);
                }
                Err(err) => {
                    warn!(strategy = strategy.name(), subject, error = %err, "generation strategy failed");
                }
            }
        }
        Err(GenerateError::Exhausted {
            attempted: self.strategies.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl Generate for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn generate(&self, _subject: &str, _max_length: usize) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl Generate for AlwaysFails {
        fn name(&self) -> &'static str {
            "always-fails"
        }

        async fn generate(&self, _subject: &str, _max_length: usize) -> Result<String> {
            Err(GenerateError::Transport("down".to_string()))
        }
    }

    #[tokio::test]
    async fn first_success_wins() {
        let stack = GeneratorStack::new(vec![
            Box::new(AlwaysFails),
            Box::new(Fixed("from the second #ELI5")),
            Box::new(Fixed("never reached #ELI5")),
        ]);
        let text = stack.generate("anything", 280).await.unwrap();
        assert_eq!(text, "from the second #ELI5");
    }

    #[tokio::test]
    async fn all_failures_report_exhausted() {
        let stack = GeneratorStack::new(vec![Box::new(AlwaysFails), Box::new(AlwaysFails)]);
        let err = stack.generate("anything", 280).await.unwrap_err();
        assert!(matches!(err, GenerateError::Exhausted { attempted: 2 }));
    }

    #[tokio::test]
    async fn empty_stack_is_exhausted_immediately() {
        let stack = GeneratorStack::new(vec![]);
        let err = stack.generate("anything", 280).await.unwrap_err();
        assert!(matches!(err, GenerateError::Exhausted { attempted: 0 }));
    }
}
