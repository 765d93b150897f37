//! Webhook-style delivery: a Discord embed per reply.
//!
//! POSTs the webhook payload `{username, embeds: [{title, description,
//! author: {name}}]}`. Discord answers 204 (or 200 with `?wait=true`);
//! anything else is a failure, with 429 surfaced as a rate-limit signal.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::ratelimit::RateLimitSignal;

use super::{Deliver, DeliverError, PreparedReply, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    username: &'a str,
    embeds: [Embed<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
    title: &'a str,
    description: &'a str,
    author: EmbedAuthor<'a>,
}

#[derive(Debug, Serialize)]
struct EmbedAuthor<'a> {
    name: &'a str,
}

/// Posts replies to a Discord channel through an incoming webhook.
#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    client: Client,
    webhook_url: String,
    username: String,
}

impl DiscordWebhook {
    pub fn new(webhook_url: impl Into<String>, username: impl Into<String>) -> Self {
        DiscordWebhook {
            client: Client::new(),
            webhook_url: webhook_url.into(),
            username: username.into(),
        }
    }
}

#[async_trait]
impl Deliver for DiscordWebhook {
    fn name(&self) -> &'static str {
        "discord-webhook"
    }

    async fn deliver(&self, reply: PreparedReply<'_>) -> Result<()> {
        let author_label = format!("@{}", reply.author_username);
        let payload = WebhookPayload {
            username: &self.username,
            embeds: [Embed {
                title: reply.subject,
                description: reply.text,
                author: EmbedAuthor {
                    name: &author_label,
                },
            }],
        };

        let response = self
            .client
            .post(&self.webhook_url)
            .timeout(REQUEST_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|err| DeliverError::Transport(err.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::OK | StatusCode::NO_CONTENT => {
                debug!(item_id = %reply.item_id, title = reply.subject, "posted to Discord");
                Ok(())
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let signal = RateLimitSignal::from_headers(response.headers());
                warn!(item_id = %reply.item_id, "Discord webhook rate limited");
                Err(DeliverError::RateLimited { signal })
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                warn!(status = status.as_u16(), body = %body, "Discord webhook failed");
                Err(DeliverError::Upstream {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}
