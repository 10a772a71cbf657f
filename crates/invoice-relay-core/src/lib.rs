//! # Invoice-Relay Core
//!
//! Core business logic for the invoice-relay webhook pipeline.
//!
//! This crate contains the domain logic for authenticating inbound chat
//! webhooks, extracting structured invoice data from free text through an
//! LLM-backed extraction call, normalizing the extracted structure into a
//! well-formed invoice document, and submitting that document to the
//! invoicing ledger service.
//!
//! ## Architecture
//!
//! The core follows clean architecture principles:
//! - Business logic depends only on trait abstractions
//! - Infrastructure implementations are injected at runtime
//! - All external collaborators (chat transport, extraction oracle, invoice
//!   ledger) are abstracted behind traits
//!
//! ## Pipeline
//!
//! A single inbound event flows linearly through four stages:
//!
//! ```text
//! verify signature -> extract structure -> normalize invoice -> submit
//! ```
//!
//! Each stage fails terminally for the current event; no stage retries
//! internally and no failure is fatal at the process level.

// ============================================================================
// Module declarations
// ============================================================================

/// Webhook signature verification with replay protection
pub mod signature;

/// Structured extraction client for the LLM oracle
pub mod extraction;

/// Invoice normalization and the ledger wire data model
pub mod invoice;

/// Invoice submission to the ledger service
pub mod ledger;

/// Pipeline orchestration and the chat transport seam
pub mod pipeline;

// Re-export key types for convenience
pub use extraction::{ExtractionError, OpenAiExtractor, RawInvoice, StructuredExtractor};
pub use invoice::{
    InvoiceDocument, InvoiceItem, InvoiceNormalizer, InvoiceNumber, InvoiceNumberGenerator,
    MalformedExtraction, RandomInvoiceNumber, WireTimestamp,
};
pub use ledger::{InvoiceId, LedgerClient, RequestFinanceClient, SubmissionError};
pub use pipeline::{ChatTransport, InvoicePipeline, MentionEvent, PipelineError, TransportError};
pub use signature::{AuthenticationError, SignatureVerifier, SigningSecretVerifier};
