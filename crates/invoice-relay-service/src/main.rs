//! # Invoice-Relay Service
//!
//! Binary entry point for the invoice-relay HTTP service.
//!
//! This executable:
//! - Loads configuration from environment and files
//! - Loads secret material from environment variables
//! - Initializes logging
//! - Wires the extraction oracle, ledger client, and chat transport into
//!   the invoice pipeline
//! - Starts the HTTP server from invoice-relay-api

mod credentials;
mod slack_transport;

use credentials::Credentials;
use invoice_relay_api::{start_server, ServiceConfig, ServiceError};
use invoice_relay_core::{
    InvoiceNormalizer, InvoicePipeline, OpenAiExtractor, RandomInvoiceNumber,
    RequestFinanceClient, SigningSecretVerifier,
};
use slack_transport::SlackTransport;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "invoice_relay_service=info,invoice_relay_api=info,invoice_relay_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Invoice-Relay Service");

    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order — later sources override earlier ones):
    //  1. ./config/service.yaml            — deployment-local file
    //  2. Path given by IR_CONFIG_FILE env — operator-specified file
    //  3. Environment variables prefixed IR__ (double-underscore separator)
    //     e.g. IR__SERVER__PORT=9090 sets server.port = 9090
    //
    // Every configuration field carries a serde default, so an entirely
    // unconfigured environment still produces a valid service config. A
    // malformed file or an uncoercible environment variable IS a hard error
    // because it indicates deliberate-but-broken operator configuration.
    //
    // Secrets never come from this layer; see [`Credentials`].
    // -------------------------------------------------------------------------
    let mut config_builder = config::Config::builder().add_source(
        config::File::with_name("config/service")
            .required(false)
            .format(config::FileFormat::Yaml),
    );

    // Optional explicit path supplied by the operator.
    if let Ok(explicit_path) = std::env::var("IR_CONFIG_FILE") {
        if !explicit_path.is_empty() {
            config_builder = config_builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
            info!(path = %explicit_path, "Loading configuration from explicit path");
        }
    }

    let config = match config_builder
        .add_source(config::Environment::with_prefix("IR").separator("__"))
        .build()
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Failed to build configuration; aborting");
            std::process::exit(3);
        }
    };

    let service_config: ServiceConfig = match config.try_deserialize() {
        Ok(sc) => sc,
        Err(e) => {
            error!(
                error = %e,
                "Could not deserialize service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(3);
        }
    };

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    let credentials = match Credentials::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Missing credentials; aborting");
            std::process::exit(3);
        }
    };

    // -------------------------------------------------------------------------
    // Wire the pipeline
    //
    // One shared reqwest client backs all three outbound collaborators; it
    // pools connections per host internally.
    // -------------------------------------------------------------------------
    let http_client = reqwest::Client::new();

    let extractor = Arc::new(OpenAiExtractor::new(
        http_client.clone(),
        credentials.openai_api_key,
    ));
    let ledger = Arc::new(RequestFinanceClient::new(
        http_client.clone(),
        credentials.ledger_api_key,
    ));
    let transport = Arc::new(SlackTransport::new(http_client, credentials.bot_token));
    let normalizer = InvoiceNormalizer::new(Arc::new(RandomInvoiceNumber));

    let pipeline = Arc::new(InvoicePipeline::new(
        extractor,
        normalizer,
        ledger,
        transport,
        credentials.bot_user_id,
    ));

    let verifier = Arc::new(SigningSecretVerifier::new(credentials.signing_secret));

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        events_path = %service_config.webhook.events_path,
        "Starting HTTP server"
    );

    // Start the server
    if let Err(e) = start_server(service_config, verifier, pipeline).await {
        error!("Failed to start server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration { .. } => 3,
        };

        std::process::exit(exit_code);
    }

    Ok(())
}
