//! Twitter/X mentions source.
//!
//! Polls the v2 mentions timeline with a bearer token, expanding author IDs
//! into usernames so queue rows are self-describing. A 429 is surfaced as
//! [`SourceError::RateLimited`] with whatever `x-rate-limit-*` metadata the
//! response carried; the ingestor decides how long to wait.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::ratelimit::RateLimitSignal;
use crate::types::{AuthorId, ItemId, UpstreamMention};

use super::{MentionSource, SourceError, SourceResult};

const API_BASE: &str = "https://api.twitter.com/2";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RESULTS: u8 = 10;

#[derive(Debug, Deserialize)]
struct MentionsResponse {
    #[serde(default)]
    data: Vec<Tweet>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    author_id: Option<String>,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    username: String,
}

/// Fetches mentions of one user from the Twitter v2 API.
#[derive(Debug, Clone)]
pub struct TwitterMentionSource {
    client: Client,
    bearer_token: String,
    user_id: String,
}

impl TwitterMentionSource {
    pub fn new(bearer_token: impl Into<String>, user_id: impl Into<String>) -> Self {
        TwitterMentionSource {
            client: Client::new(),
            bearer_token: bearer_token.into(),
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl MentionSource for TwitterMentionSource {
    async fn fetch_new(&self, since: Option<&ItemId>) -> SourceResult<Vec<UpstreamMention>> {
        let url = format!("{API_BASE}/users/{}/mentions", self.user_id);
        let mut request = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .timeout(REQUEST_TIMEOUT)
            .query(&[
                ("max_results", MAX_RESULTS.to_string()),
                ("expansions", "author_id".to_string()),
            ]);
        if let Some(since) = since {
            request = request.query(&[("since_id", since.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|err| SourceError::Transport(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let signal = RateLimitSignal::from_headers(response.headers());
            return Err(SourceError::RateLimited { signal });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MentionsResponse = response
            .json()
            .await
            .map_err(|err| SourceError::MalformedResponse(err.to_string()))?;

        let mentions = parsed
            .data
            .into_iter()
            .map(|tweet| {
                let username = tweet.author_id.as_ref().and_then(|author| {
                    parsed
                        .includes
                        .users
                        .iter()
                        .find(|user| &user.id == author)
                        .map(|user| user.username.clone())
                });
                UpstreamMention {
                    id: ItemId::new(tweet.id),
                    author_id: AuthorId::new(tweet.author_id.unwrap_or_default()),
                    author_username: username,
                    text: tweet.text,
                }
            })
            .collect::<Vec<_>>();

        debug!(count = mentions.len(), "fetched mentions from Twitter");
        Ok(mentions)
    }
}
