//! Generation via the remote explanation service.
//!
//! POSTs `{"subject": ...}` to the configured endpoint and reads back
//! `{"explanation": ...}`. The HTTP client is constructed once and reused;
//! a fresh connection per call buys nothing but handshakes.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::format::format_response;
use super::{GenerateError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct ExplainRequest<'a> {
    subject: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_length: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ExplainResponse {
    explanation: String,
}

/// The HTTP-backed generation strategy.
#[derive(Debug, Clone)]
pub struct RemoteLlm {
    client: Client,
    endpoint: String,
}

impl RemoteLlm {
    pub fn new(endpoint: impl Into<String>) -> Self {
        RemoteLlm {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub(super) async fn generate(&self, subject: &str, max_length: usize) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(REQUEST_TIMEOUT)
            .json(&ExplainRequest {
                subject,
                max_length: Some(max_length),
            })
            .send()
            .await
            .map_err(|err| GenerateError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ExplainResponse = response
            .json()
            .await
            .map_err(|err| GenerateError::MalformedResponse(err.to_string()))?;

        if parsed.explanation.trim().is_empty() {
            return Err(GenerateError::MalformedResponse(
                "empty explanation".to_string(),
            ));
        }

        debug!(subject, chars = parsed.explanation.len(), "remote generation succeeded");
        Ok(format_response(&parsed.explanation, max_length))
    }
}
