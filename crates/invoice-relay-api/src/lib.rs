//! # Invoice-Relay HTTP Service
//!
//! HTTP server for receiving chat platform webhooks and driving them through
//! the invoice pipeline.
//!
//! This service provides:
//! - Event callback endpoint with signature validation and replay protection
//! - Endpoint ownership verification (challenge echo)
//! - Health check endpoint
//!
//! Every inbound request is authenticated before its body is interpreted;
//! the challenge echo is no exception.

// Public modules
pub mod config;
pub mod errors;
pub mod responses;

pub use config::{LoggingConfig, ServerConfig, ServiceConfig, WebhookConfig};
pub use errors::{ServiceError, WebhookHandlerError};
pub use responses::{ChallengeResponse, EventAck, HealthResponse};


use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use invoice_relay_core::{InvoicePipeline, MentionEvent, SignatureVerifier};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

/// Header carrying the sender's request timestamp.
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Header carrying the sender's request signature.
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Verifier for inbound request signatures
    pub verifier: Arc<dyn SignatureVerifier>,

    /// Pipeline handling authenticated mention events
    pub pipeline: Arc<InvoicePipeline>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        verifier: Arc<dyn SignatureVerifier>,
        pipeline: Arc<InvoicePipeline>,
    ) -> Self {
        Self {
            config,
            verifier,
            pipeline,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let event_routes =
        Router::new().route(&state.config.webhook.events_path, post(handle_event));

    let health_routes = Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health_check));

    Router::new()
        .merge(event_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server
pub async fn start_server(
    config: ServiceConfig,
    verifier: Arc<dyn SignatureVerifier>,
    pipeline: Arc<InvoicePipeline>,
) -> Result<(), ServiceError> {
    config
        .validate()
        .map_err(|message| ServiceError::Configuration { message })?;

    let address = format!("{}:{}", config.server.host, config.server.port);
    let shutdown_timeout = std::time::Duration::from_secs(config.server.shutdown_timeout_seconds);

    let state = AppState::new(config, verifier, pipeline);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!("Starting HTTP server on {}", address);

    let shutdown_signal = async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C signal handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
            },
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
            },
        }
    };

    // In-flight requests complete before shutdown; new connections are
    // refused as soon as the signal arrives.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

// ============================================================================
// Event Handlers
// ============================================================================

/// Handle chat platform event callbacks
///
/// Every request passes through the same gate in order:
/// 1. Both authentication headers must be present (403 otherwise)
/// 2. The signature must verify against the raw body (403 otherwise)
/// 3. The body must be valid JSON (400 otherwise)
///
/// Only then is the payload interpreted. Ownership-verification challenges
/// are echoed back; mention events are acknowledged immediately and handed
/// to the pipeline on a background task, so the sender's delivery timeout is
/// never at the mercy of the extraction oracle.
#[instrument(skip(state, headers, body))]
pub async fn handle_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WebhookHandlerError> {
    let timestamp = require_header(&headers, TIMESTAMP_HEADER)?;
    let signature = require_header(&headers, SIGNATURE_HEADER)?;

    state.verifier.verify(&body, timestamp, signature).await?;

    let payload: serde_json::Value = serde_json::from_slice(&body)?;

    // Ownership verification: echo the challenge, whether it arrives as a
    // bare key or wrapped in a url_verification envelope.
    let is_verification = payload.get("challenge").is_some()
        || payload.get("type").and_then(|t| t.as_str()) == Some("url_verification");
    if is_verification {
        info!("Responding to ownership verification challenge");
        let challenge = payload
            .get("challenge")
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string();
        return Ok(Json(ChallengeResponse { challenge }).into_response());
    }

    if let Some(event) = payload.get("event") {
        if event.get("type").and_then(|t| t.as_str()) == Some("app_mention") {
            let mention = MentionEvent {
                channel: event
                    .get("channel")
                    .and_then(|c| c.as_str())
                    .unwrap_or("")
                    .to_string(),
                text: event
                    .get("text")
                    .and_then(|t| t.as_str())
                    .unwrap_or("")
                    .to_string(),
            };

            info!(channel = %mention.channel, "Dispatching mention event to pipeline");

            // The pipeline owns user-facing failure notices; here we only
            // log the terminal error.
            let pipeline = Arc::clone(&state.pipeline);
            tokio::spawn(async move {
                if let Err(e) = pipeline.handle_mention(mention).await {
                    error!(error = %e, "Pipeline run failed");
                }
            });
        } else {
            warn!(
                event_type = event.get("type").and_then(|t| t.as_str()).unwrap_or("<missing>"),
                "Ignoring unhandled event type"
            );
        }
    }

    Ok(Json(EventAck::accepted()).into_response())
}

/// Extract a required header as UTF-8 text.
fn require_header<'a>(
    headers: &'a HeaderMap,
    name: &'static str,
) -> Result<&'a str, WebhookHandlerError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or(WebhookHandlerError::MissingHeader { name })
}

// ============================================================================
// Health Check Handlers
// ============================================================================

/// Root endpoint, useful as a liveness probe for platform health checks.
async fn handle_root() -> &'static str {
    "Hello World!"
}

/// Basic health check endpoint
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
