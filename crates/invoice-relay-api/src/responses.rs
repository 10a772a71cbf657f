//! Response types for the API.

use serde::Serialize;

// ============================================================================
// Response Types
// ============================================================================

/// Echo response for endpoint ownership verification
///
/// The chat platform proves endpoint ownership by posting a one-time
/// challenge token; the service must return it verbatim.
#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub challenge: String,
}

/// Acknowledgement returned for accepted event callbacks
///
/// Events are processed asynchronously; the sender only needs to know the
/// request was received and authenticated.
#[derive(Debug, Serialize)]
pub struct EventAck {
    pub status: String,
}

impl EventAck {
    pub fn accepted() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}
