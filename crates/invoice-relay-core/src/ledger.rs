//! Invoice submission to the ledger service.
//!
//! The ledger service is the external system of record: it accepts a
//! well-formed invoice document over authenticated HTTP and answers with a
//! persisted identifier. Submission is a single attempt with no automatic
//! retry and no deduplication; submitting equivalent content twice creates
//! two distinct invoices, which is accepted behavior.

use crate::invoice::InvoiceDocument;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use tracing::{info, instrument};

/// Default ledger service endpoint base.
pub const DEFAULT_LEDGER_BASE_URL: &str = "https://api.request.finance";

// ============================================================================
// InvoiceId
// ============================================================================

/// Ledger-assigned identifier of a persisted invoice.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvoiceId(String);

impl InvoiceId {
    /// Wrap a ledger identifier.
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Get string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Failures of a single submission attempt.
///
/// Upstream status and body are carried for server-side diagnostics; they
/// are logged, not relayed verbatim to the end user.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// The ledger service was unreachable.
    #[error("ledger request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The ledger service answered with a non-2xx status.
    #[error("ledger service rejected the invoice with {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The ledger answered 2xx but without an identifier field.
    #[error("ledger response carried no invoice identifier")]
    MissingId,
}

// ============================================================================
// LedgerClient trait
// ============================================================================

/// Interface for the invoice ledger service.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit a normalized document; returns the ledger-assigned identifier.
    async fn create_invoice(&self, document: &InvoiceDocument)
        -> Result<InvoiceId, SubmissionError>;

    /// Convert a draft invoice into an actionable payment request.
    async fn convert_to_request(&self, id: &InvoiceId) -> Result<(), SubmissionError>;
}

// ============================================================================
// RequestFinanceClient
// ============================================================================

/// [`LedgerClient`] for the Request Finance invoicing API.
///
/// Authentication is a raw API key in the `Authorization` header (the
/// service's scheme, no `Bearer` prefix).
pub struct RequestFinanceClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl RequestFinanceClient {
    /// Create a client against the production endpoint.
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_LEDGER_BASE_URL.to_string(),
        }
    }

    /// Override the endpoint base URL (tests point this at a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl fmt::Debug for RequestFinanceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestFinanceClient")
            .field("api_key", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl LedgerClient for RequestFinanceClient {
    /// Issue the single authenticated creation request.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError::Transport`] on wire failure,
    /// [`SubmissionError::Rejected`] on a non-2xx answer (status and body
    /// preserved), and [`SubmissionError::MissingId`] when the success
    /// response lacks the `id` field.
    #[instrument(skip(self, document), fields(invoice_number = %document.invoice_number))]
    async fn create_invoice(
        &self,
        document: &InvoiceDocument,
    ) -> Result<InvoiceId, SubmissionError> {
        let response = self
            .client
            .post(format!("{}/invoices", self.base_url))
            .header("Authorization", &self.api_key)
            .json(document)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SubmissionError::Rejected { status, body });
        }

        #[derive(Deserialize)]
        struct CreateResponse {
            id: Option<String>,
        }

        let created: CreateResponse = response
            .json()
            .await
            .map_err(SubmissionError::Transport)?;

        let id = created.id.map(InvoiceId::new).ok_or(SubmissionError::MissingId)?;

        info!(invoice_id = %id, "Invoice persisted by ledger service");
        Ok(id)
    }

    /// Convert a persisted draft into a payment request.
    #[instrument(skip(self))]
    async fn convert_to_request(&self, id: &InvoiceId) -> Result<(), SubmissionError> {
        let response = self
            .client
            .post(format!("{}/invoices/{}", self.base_url, id))
            .header("Authorization", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SubmissionError::Rejected { status, body });
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
