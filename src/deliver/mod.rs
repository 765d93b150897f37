//! Reply delivery: the contract the pipeline posts through.
//!
//! Two delivery shapes exist: reply-style (post text in reply to the original
//! item, e.g. a tweet reply) and webhook-style (post a titled embed to a
//! channel). The pipeline depends only on [`Deliver`]; the platform client
//! behind the reply shape is an external collaborator expressed by the
//! [`PostReply`] contract.

pub mod webhook;

use async_trait::async_trait;
use thiserror::Error;

use crate::ratelimit::RateLimitSignal;
use crate::types::ItemId;

pub use webhook::DiscordWebhook;

/// Errors a delivery attempt can produce.
#[derive(Debug, Error)]
pub enum DeliverError {
    /// The request never completed (connect failure, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("upstream returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The service reported "too many requests".
    ///
    /// Carries whatever reset metadata the response included so the caller
    /// can back off precisely.
    #[error("rate limited")]
    RateLimited { signal: Option<RateLimitSignal> },
}

/// Result type for delivery.
pub type Result<T> = std::result::Result<T, DeliverError>;

/// Everything a delivery implementation may need about one reply.
#[derive(Debug, Clone, Copy)]
pub struct PreparedReply<'a> {
    /// The item being replied to.
    pub item_id: &'a ItemId,

    /// The extracted subject (webhook embeds use it as the title).
    pub subject: &'a str,

    /// The generated reply text, marker-terminated.
    pub text: &'a str,

    /// Username of the mention's author, without the `@`.
    pub author_username: &'a str,
}

/// The delivery contract the pipeline depends on.
#[async_trait]
pub trait Deliver: Send + Sync {
    /// Short name for log lines.
    fn name(&self) -> &'static str;

    async fn deliver(&self, reply: PreparedReply<'_>) -> Result<()>;
}

/// The reply-style platform client contract (external collaborator).
///
/// Posting a tweet reply is the canonical implementation; tests use fakes.
#[async_trait]
pub trait PostReply: Send + Sync {
    async fn post_reply(&self, text: &str, in_reply_to: &ItemId) -> Result<()>;
}

/// Adapts any [`PostReply`] client into the [`Deliver`] contract.
pub struct ReplyDelivery<P> {
    client: P,
}

impl<P: PostReply> ReplyDelivery<P> {
    pub fn new(client: P) -> Self {
        ReplyDelivery { client }
    }
}

#[async_trait]
impl<P: PostReply> Deliver for ReplyDelivery<P> {
    fn name(&self) -> &'static str {
        "reply"
    }

    async fn deliver(&self, reply: PreparedReply<'_>) -> Result<()> {
        self.client.post_reply(reply.text, reply.item_id).await
    }
}
