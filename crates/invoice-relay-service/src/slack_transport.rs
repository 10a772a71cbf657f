//! Outbound chat transport backed by the Slack Web API.
//!
//! Implements the core [`ChatTransport`] seam over `chat.postMessage`. Slack
//! reports application-level failures with HTTP 200 and `"ok": false`, so
//! the response body is inspected as well as the status code.

use invoice_relay_core::{ChatTransport, TransportError};
use serde::Deserialize;
use tracing::{debug, instrument};

/// Default Slack Web API base URL.
pub const DEFAULT_SLACK_BASE_URL: &str = "https://slack.com/api";

/// [`ChatTransport`] implementation posting through `chat.postMessage`.
pub struct SlackTransport {
    client: reqwest::Client,
    bot_token: String,
    base_url: String,
}

/// Envelope Slack wraps every Web API response in.
#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    error: Option<String>,
}

impl SlackTransport {
    pub fn new(client: reqwest::Client, bot_token: String) -> Self {
        Self {
            client,
            bot_token,
            base_url: DEFAULT_SLACK_BASE_URL.to_string(),
        }
    }

    /// Override the API base URL. Intended for tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait::async_trait]
impl ChatTransport for SlackTransport {
    #[instrument(skip(self, text), fields(channel = %channel))]
    async fn say(&self, channel: &str, text: &str) -> Result<(), TransportError> {
        let url = format!("{}/chat.postMessage", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bot_token)
            .json(&serde_json::json!({
                "channel": channel,
                "text": text,
            }))
            .send()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(format!(
                "chat.postMessage returned HTTP {status}"
            )));
        }

        let envelope: SlackApiResponse = response
            .json()
            .await
            .map_err(|e| TransportError::new(format!("unreadable chat API response: {e}")))?;

        if !envelope.ok {
            return Err(TransportError::new(format!(
                "chat.postMessage rejected: {}",
                envelope.error.unwrap_or_else(|| "unknown error".to_string())
            )));
        }

        debug!("Message delivered");
        Ok(())
    }
}

impl std::fmt::Debug for SlackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackTransport")
            .field("bot_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "slack_transport_tests.rs"]
mod tests;
