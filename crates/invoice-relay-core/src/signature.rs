//! Webhook signature verification.
//!
//! Inbound webhook requests carry two headers: a Unix timestamp and an
//! HMAC-SHA256 signature computed by the sender over a canonical string
//! built from a fixed version prefix, the timestamp, and the raw request
//! body, keyed by a secret shared between the sender and this service.
//!
//! Verification is a pure predicate over the request plus the current time:
//!
//! 1. Reject when the claimed timestamp is further than
//!    [`TIMESTAMP_TOLERANCE_SECS`] from the current time (replay/staleness
//!    protection). There is no grace extension for clock skew.
//! 2. Reject when the signature does not match the HMAC over
//!    `v0:{timestamp}:{body}`.
//!
//! Any failure is terminal for the request; callers must answer with an
//! authorization failure and must not process the payload further.
//!
//! The digest comparison delegates to [`hmac::Mac::verify_slice`], which is
//! constant-time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{instrument, warn};

type HmacSha256 = Hmac<Sha256>;

/// Version prefix of the canonical signing string and the signature header.
pub const SIGNATURE_VERSION: &str = "v0";

/// Maximum allowed distance between the claimed timestamp and the current
/// time, in seconds. Requests outside this window are rejected regardless of
/// signature validity.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

// ============================================================================
// Error Types
// ============================================================================

/// Reasons an inbound webhook request fails authentication.
///
/// All variants are terminal: the request must be rejected with an
/// authorization-denied response and never reach later pipeline stages.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthenticationError {
    /// The timestamp header is not a parseable Unix timestamp.
    #[error("timestamp header is not a valid Unix timestamp: '{value}'")]
    MalformedTimestamp { value: String },

    /// The claimed timestamp is outside the tolerance window.
    #[error("timestamp is {skew_secs}s away from current time (tolerance {TIMESTAMP_TOLERANCE_SECS}s)")]
    StaleTimestamp { skew_secs: i64 },

    /// The signature header does not carry a `v0=<hex>` digest.
    #[error("signature header is malformed: {message}")]
    MalformedSignature { message: String },

    /// The HMAC-SHA256 digest does not match the canonical string.
    #[error("signature does not match request body and timestamp")]
    SignatureMismatch,
}

// ============================================================================
// SignatureVerifier trait
// ============================================================================

/// Interface for webhook request authentication.
///
/// Implementations decide accept/reject for the raw request body plus the
/// claimed timestamp and signature headers. The check has no side effects.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Verify that `signature` is a valid HMAC over `timestamp` and `body`
    /// and that `timestamp` is within the freshness window.
    async fn verify(
        &self,
        body: &[u8],
        timestamp: &str,
        signature: &str,
    ) -> Result<(), AuthenticationError>;
}

// ============================================================================
// SigningSecretVerifier
// ============================================================================

/// A [`SignatureVerifier`] backed by the shared signing secret.
///
/// The secret is held in memory for the lifetime of the process and is
/// redacted from `Debug` output.
pub struct SigningSecretVerifier {
    secret: String,
}

impl SigningSecretVerifier {
    /// Construct a verifier from the shared signing secret.
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Verify against an explicit current time.
    ///
    /// [`SignatureVerifier::verify`] delegates here with `Utc::now()`; tests
    /// inject fixed clocks to exercise the staleness window deterministically.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError::MalformedTimestamp`] when the timestamp
    /// header cannot be parsed, [`AuthenticationError::StaleTimestamp`] when
    /// it falls outside the tolerance window, and
    /// [`AuthenticationError::MalformedSignature`] /
    /// [`AuthenticationError::SignatureMismatch`] for signature failures.
    pub fn verify_at(
        &self,
        body: &[u8],
        timestamp: &str,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthenticationError> {
        let claimed: i64 =
            timestamp
                .parse()
                .map_err(|_| AuthenticationError::MalformedTimestamp {
                    value: timestamp.to_string(),
                })?;

        // Staleness check first: a stale request is rejected even when its
        // signature would otherwise be valid.
        let skew_secs = (now.timestamp() - claimed).abs();
        if skew_secs > TIMESTAMP_TOLERANCE_SECS {
            warn!(skew_secs, "Rejecting webhook with stale timestamp");
            return Err(AuthenticationError::StaleTimestamp { skew_secs });
        }

        let sig_bytes = {
            let hex_part = signature
                .strip_prefix(&format!("{SIGNATURE_VERSION}="))
                .ok_or_else(|| AuthenticationError::MalformedSignature {
                    message: format!("missing '{SIGNATURE_VERSION}=' prefix"),
                })?;
            hex::decode(hex_part).map_err(|_| AuthenticationError::MalformedSignature {
                message: "digest is not valid hex".to_string(),
            })?
        };

        // Canonical string: "v0:{timestamp}:{body}".
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).map_err(|_| {
            AuthenticationError::MalformedSignature {
                message: "secret cannot be used as HMAC key".to_string(),
            }
        })?;
        mac.update(SIGNATURE_VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);

        mac.verify_slice(&sig_bytes)
            .map_err(|_| AuthenticationError::SignatureMismatch)
    }
}

impl std::fmt::Debug for SigningSecretVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSecretVerifier")
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

#[async_trait]
impl SignatureVerifier for SigningSecretVerifier {
    #[instrument(skip(self, body, signature), fields(body_len = body.len()))]
    async fn verify(
        &self,
        body: &[u8],
        timestamp: &str,
        signature: &str,
    ) -> Result<(), AuthenticationError> {
        self.verify_at(body, timestamp, signature, Utc::now())
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
