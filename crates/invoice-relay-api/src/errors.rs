//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use invoice_relay_core::AuthenticationError;
use tracing::{error, warn};

/// Webhook handler errors with HTTP status code mapping
///
/// - `403 Forbidden`: authentication failures — a missing header, a stale
///   timestamp, or a signature mismatch. There is no partial trust; any of
///   these is terminal and the payload is never processed.
/// - `400 Bad Request`: an authenticated body that is not valid JSON.
/// - `500 Internal Server Error`: unexpected server failures. Details are
///   logged server-side; the client gets a generic message.
///
/// Error messages returned to clients are sanitized; nothing about the
/// expected signature or secret is disclosed.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// A required authentication header is absent.
    ///
    /// Maps to: `403 Forbidden`. Treated as an authentication failure, not
    /// a malformed request: an unsigned request is an untrusted request.
    #[error("missing required header: {name}")]
    MissingHeader { name: &'static str },

    /// Signature verification rejected the request.
    ///
    /// Maps to: `403 Forbidden`.
    #[error("request authentication failed: {0}")]
    Unauthorized(#[from] AuthenticationError),

    /// The verified body is not valid JSON.
    ///
    /// Maps to: `400 Bad Request`.
    #[error("request body is not valid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),

    /// Unexpected internal server error.
    ///
    /// Maps to: `500 Internal Server Error`.
    #[error("internal server error: {message}")]
    Internal { message: String },
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingHeader { .. } | Self::Unauthorized(_) => {
                warn!(error = %self, "Rejecting unauthenticated webhook request");
                (StatusCode::FORBIDDEN, "request could not be authenticated".to_string())
            }
            Self::InvalidBody(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::Internal { ref message } => {
                error!(error = %message, "Internal server error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        (status, Json(body)).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("server failed: {message}")]
    ServerFailed { message: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },
}
