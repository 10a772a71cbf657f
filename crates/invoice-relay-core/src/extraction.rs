//! Structured extraction client for the LLM oracle.
//!
//! The oracle maps free text plus a fixed invoice schema to a best-effort
//! structured answer. It is treated as untrusted and non-deterministic: the
//! client makes exactly one attempt per call, never retries, and hands the
//! result back as an opaque [`RawInvoice`] for the normalizer to validate
//! field by field.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

/// Default chat-completions endpoint base.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default extraction model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Name of the function the model is forced to call.
const EXTRACTION_FUNCTION: &str = "record_invoice";

// ============================================================================
// RawInvoice
// ============================================================================

/// Untrusted structured output of the extraction oracle.
///
/// No field is guaranteed present; values may be missing, wrongly typed, or
/// absent entirely. Shape validation happens at the normalization boundary,
/// not here.
#[derive(Debug, Clone, PartialEq)]
pub struct RawInvoice(Value);

impl RawInvoice {
    /// Wrap an oracle result.
    ///
    /// Some oracle responses nest the invoice object under an
    /// `invoice_schema` envelope key; the envelope is unwrapped here so the
    /// rest of the pipeline sees one shape.
    pub fn new(mut value: Value) -> Self {
        if let Some(inner) = value.get_mut("invoice_schema") {
            return Self(inner.take());
        }
        Self(value)
    }

    /// Access the underlying JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// The line-item array, when the oracle produced one.
    pub fn items(&self) -> Option<&[Value]> {
        self.0.get("items").and_then(Value::as_array).map(Vec::as_slice)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Failures of a single extraction attempt.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The oracle was unreachable (connect, DNS, timeout, body read).
    #[error("extraction request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The oracle answered with a non-2xx status.
    #[error("extraction service returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// The oracle answered 2xx but the structured content is not valid JSON.
    #[error("extraction result is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The oracle answered 2xx but carried neither a function call nor
    /// message content to parse.
    #[error("extraction response carried no structured content")]
    MissingContent,
}

// ============================================================================
// StructuredExtractor trait
// ============================================================================

/// Interface for the structured-extraction oracle.
///
/// One outbound call per invocation; no local state is retained between
/// calls. Callers may layer retries externally, the contract itself is
/// single-attempt.
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    /// Extract a raw invoice structure from free text.
    async fn extract_invoice(&self, text: &str) -> Result<RawInvoice, ExtractionError>;
}

// ============================================================================
// OpenAiExtractor
// ============================================================================

/// [`StructuredExtractor`] backed by the OpenAI chat-completions API.
///
/// The invoice schema is a fixed contract sent with every call via the
/// function-calling interface; it is not configurable per request. The model
/// runs at temperature 0 to keep extraction as deterministic as the oracle
/// allows, which is still no guarantee of correctness.
pub struct OpenAiExtractor {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiExtractor {
    /// Create an extractor against the production endpoint.
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Override the endpoint base URL (tests point this at a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the extraction model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The fixed target schema: recipient field plus a line-item array with
    /// quantity/name/price/currency sub-fields.
    fn invoice_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "recipient_email": {
                    "type": "string",
                    "description": "Email of invoice recipient."
                },
                "items": {
                    "type": "array",
                    "description": "Array of invoice items being charged to recipient",
                    "items": {
                        "type": "object",
                        "description": "Information about one type of invoice item",
                        "properties": {
                            "quantity": {
                                "type": "number",
                                "description": "The number of invoice items of this type in the invoice"
                            },
                            "name": {
                                "type": "string",
                                "description": "Name of the invoice item"
                            },
                            "price": {
                                "type": "number",
                                "description": "Price of the invoice item"
                            },
                            "currency": {
                                "type": "string",
                                "description": "Payment currency the item is priced in"
                            }
                        }
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for OpenAiExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiExtractor")
            .field("api_key", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl StructuredExtractor for OpenAiExtractor {
    /// Send the free text plus the fixed schema to the oracle.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Transport`] when the call fails on the
    /// wire, [`ExtractionError::UpstreamStatus`] on a non-2xx answer,
    /// [`ExtractionError::Parse`] when the structured content is not JSON,
    /// and [`ExtractionError::MissingContent`] when the response carries no
    /// usable content at all.
    #[instrument(skip(self, text), fields(model = %self.model, text_len = text.len()))]
    async fn extract_invoice(&self, text: &str) -> Result<RawInvoice, ExtractionError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": &self.model,
                "messages": [
                    {
                        "role": "system",
                        "content": "You are a world class algorithm for extracting invoice \
                                    information in a structured format."
                    },
                    {
                        "role": "user",
                        "content": format!(
                            "Use the given format to extract information from the following \
                             input: {text}"
                        )
                    }
                ],
                "temperature": 0,
                "functions": [{
                    "name": EXTRACTION_FUNCTION,
                    "description": "Record the invoice described by the user.",
                    "parameters": Self::invoice_schema()
                }],
                "function_call": {"name": EXTRACTION_FUNCTION}
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::UpstreamStatus { status, body });
        }

        #[derive(Deserialize)]
        struct FunctionCall {
            arguments: String,
        }
        #[derive(Deserialize)]
        struct Message {
            function_call: Option<FunctionCall>,
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let response_text = response.text().await?;
        let api_response: ApiResponse = serde_json::from_str(&response_text)?;
        let message = api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(ExtractionError::MissingContent)?;

        // Function-call arguments are the primary path; plain message content
        // is accepted as a fallback when the model ignores the forced call.
        let raw_json = match (message.function_call, message.content) {
            (Some(call), _) => call.arguments,
            (None, Some(content)) => content,
            (None, None) => return Err(ExtractionError::MissingContent),
        };

        debug!(raw_len = raw_json.len(), "Received structured extraction result");

        let value: Value = serde_json::from_str(&raw_json)?;
        Ok(RawInvoice::new(value))
    }
}

#[cfg(test)]
#[path = "extraction_tests.rs"]
mod tests;
