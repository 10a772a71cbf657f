//! Pipeline orchestration.
//!
//! Sequences extraction, normalization, and submission for one inbound
//! mention event, with short-circuit failure propagation: a failed stage
//! never reaches the next one. Signature verification happens earlier, at
//! the HTTP boundary, so nothing unauthenticated arrives here.
//!
//! Extraction can be slow, so an acknowledgement is sent over the chat
//! transport before the oracle call begins. Each failure class maps to its
//! own user-facing message; upstream diagnostics stay in the logs.

use crate::extraction::{ExtractionError, StructuredExtractor};
use crate::invoice::{InvoiceNormalizer, MalformedExtraction};
use crate::ledger::{LedgerClient, SubmissionError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Base URL prepended to the ledger identifier in the success reply.
pub const DEFAULT_DRAFT_BASE_URL: &str = "https://app.request.finance/draft/";

/// Acknowledgement sent before extraction begins.
const ACK_MESSAGE: &str = "Sure, extracting invoice data";

/// User-facing messages per failure class. Submission details are logged,
/// never relayed.
const EXTRACTION_FAILED_MESSAGE: &str =
    "Sorry, I couldn't extract invoice data from that message.";
const MALFORMED_MESSAGE: &str =
    "I couldn't find any billable items in that message. Please include at least one item with a price.";
const SUBMISSION_FAILED_MESSAGE: &str =
    "The invoicing service rejected the invoice. Please try again later.";

// ============================================================================
// Chat transport seam
// ============================================================================

/// Failure to deliver an outbound chat message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("chat transport failed: {message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Outbound side of the messaging platform: accepts text for a channel.
///
/// Inbound event delivery belongs to the HTTP layer; this trait only covers
/// replies.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Post `text` to `channel`.
    async fn say(&self, channel: &str, text: &str) -> Result<(), TransportError>;
}

// ============================================================================
// Events and errors
// ============================================================================

/// One inbound mention addressed to the bot.
#[derive(Debug, Clone)]
pub struct MentionEvent {
    /// Channel to reply into.
    pub channel: String,
    /// Raw message text, possibly still carrying the mention token.
    pub text: String,
}

/// Terminal failure of one pipeline run.
///
/// None of these are retried internally and none crash the service; the
/// next inbound event starts from a clean slate.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("extraction result was malformed: {0}")]
    Malformed(#[from] MalformedExtraction),

    #[error("submission failed: {0}")]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

// ============================================================================
// InvoicePipeline
// ============================================================================

/// Orchestrates extract -> normalize -> submit for one mention event.
pub struct InvoicePipeline {
    extractor: Arc<dyn StructuredExtractor>,
    normalizer: InvoiceNormalizer,
    ledger: Arc<dyn LedgerClient>,
    transport: Arc<dyn ChatTransport>,
    bot_user_id: String,
    draft_base_url: String,
}

impl InvoicePipeline {
    /// Wire a pipeline from its collaborators.
    pub fn new(
        extractor: Arc<dyn StructuredExtractor>,
        normalizer: InvoiceNormalizer,
        ledger: Arc<dyn LedgerClient>,
        transport: Arc<dyn ChatTransport>,
        bot_user_id: String,
    ) -> Self {
        Self {
            extractor,
            normalizer,
            ledger,
            transport,
            bot_user_id,
            draft_base_url: DEFAULT_DRAFT_BASE_URL.to_string(),
        }
    }

    /// Override the draft link base URL.
    pub fn with_draft_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.draft_base_url = base_url.into();
        self
    }

    /// Run the pipeline for one mention and reply with the draft link.
    ///
    /// Returns the link on success. On failure the user has already been
    /// told what went wrong in that stage's terms; the error is returned for
    /// the caller's logging.
    #[instrument(skip(self, event), fields(channel = %event.channel))]
    pub async fn handle_mention(&self, event: MentionEvent) -> Result<String, PipelineError> {
        let text = self.strip_mention(&event.text);

        // At-least-one-intermediate-notice: the oracle call may take a
        // while, so acknowledge before starting it.
        self.transport.say(&event.channel, ACK_MESSAGE).await?;

        let raw = match self.extractor.extract_invoice(&text).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Extraction failed");
                self.say_best_effort(&event.channel, EXTRACTION_FAILED_MESSAGE).await;
                return Err(e.into());
            }
        };

        let document = match self.normalizer.normalize(&raw) {
            Ok(document) => document,
            Err(e) => {
                warn!(error = %e, "Extraction result was structurally incomplete");
                self.say_best_effort(&event.channel, MALFORMED_MESSAGE).await;
                return Err(e.into());
            }
        };

        let invoice_id = match self.ledger.create_invoice(&document).await {
            Ok(id) => id,
            Err(e) => {
                // Upstream status/body land in the log, not in the channel.
                error!(error = %e, "Ledger submission failed");
                self.say_best_effort(&event.channel, SUBMISSION_FAILED_MESSAGE).await;
                return Err(e.into());
            }
        };

        let link = format!("{}{}", self.draft_base_url, invoice_id);
        info!(invoice_id = %invoice_id, "Invoice created");

        self.transport
            .say(&event.channel, &format!("Invoice created: {link}"))
            .await?;

        Ok(link)
    }

    /// Remove the bot's mention token from the message text.
    fn strip_mention(&self, text: &str) -> String {
        text.replace(&format!("<@{}>", self.bot_user_id), "")
            .trim()
            .to_string()
    }

    /// Deliver a failure notice without letting a transport hiccup mask the
    /// original error.
    async fn say_best_effort(&self, channel: &str, text: &str) {
        if let Err(e) = self.transport.say(channel, text).await {
            warn!(error = %e, "Failed to deliver failure notice");
        }
    }
}

impl std::fmt::Debug for InvoicePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvoicePipeline")
            .field("bot_user_id", &self.bot_user_id)
            .field("draft_base_url", &self.draft_base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
