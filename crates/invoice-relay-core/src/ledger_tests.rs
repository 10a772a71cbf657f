//! Tests for [`RequestFinanceClient`] against a wiremock ledger.

use super::*;
use crate::extraction::RawInvoice;
use crate::invoice::{build_document, InvoiceNumber};
use chrono::DateTime;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

fn client_for(server: &MockServer) -> RequestFinanceClient {
    RequestFinanceClient::new(reqwest::Client::new(), "ledger-api-key".to_string())
        .with_base_url(server.uri())
}

fn sample_document() -> InvoiceDocument {
    let raw = RawInvoice::new(json!({
        "recipient_email": "a@b.com",
        "items": [{"item": "Chair", "quantity": 2, "price": 50}]
    }));
    let now = DateTime::from_timestamp(1_714_566_645, 0).unwrap();
    build_document(&raw, InvoiceNumber::new("A12345".to_string()), now).unwrap()
}

// ============================================================================
// create_invoice tests
// ============================================================================

mod create_invoice_tests {
    use super::*;

    /// A 201 with an id yields the identifier; the request carries the raw
    /// API key and the exact wire field names.
    #[tokio::test]
    async fn test_successful_creation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/invoices"))
            .and(header("Authorization", "ledger-api-key"))
            .and(body_partial_json(json!({
                "invoiceNumber": "A12345",
                "paymentCurrency": "USDC-matic",
                "buyerInfo": {"email": "a@b.com"},
                "invoiceItems": [{
                    "currency": "USD",
                    "name": "Chair",
                    "quantity": 2,
                    "unitPrice": 5000,
                    "tax": {"type": "fixed", "amount": "0"}
                }]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "inv_42"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = client_for(&server)
            .create_invoice(&sample_document())
            .await
            .expect("creation should succeed");

        assert_eq!(id.as_str(), "inv_42");
    }

    /// A non-2xx answer carries the upstream status and body for
    /// diagnostics.
    #[tokio::test]
    async fn test_rejection_preserves_diagnostics() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/invoices"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"message":"buyer email invalid"}"#),
            )
            .mount(&server)
            .await;

        let result = client_for(&server).create_invoice(&sample_document()).await;

        match result {
            Err(SubmissionError::Rejected { status, body }) => {
                assert_eq!(status, 400);
                assert!(body.contains("buyer email invalid"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    /// A 2xx answer without an id field is `MissingId`.
    #[tokio::test]
    async fn test_missing_identifier() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/invoices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "open"})))
            .mount(&server)
            .await;

        let result = client_for(&server).create_invoice(&sample_document()).await;

        assert!(matches!(result, Err(SubmissionError::MissingId)));
    }
}

// ============================================================================
// convert_to_request tests
// ============================================================================

mod convert_to_request_tests {
    use super::*;

    /// Conversion POSTs to the per-invoice path with the credential.
    #[tokio::test]
    async fn test_successful_conversion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/invoices/inv_42"))
            .and(header("Authorization", "ledger-api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "inv_42"})))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .convert_to_request(&InvoiceId::new("inv_42".to_string()))
            .await;

        assert!(result.is_ok());
    }

    /// A rejected conversion surfaces status and body.
    #[tokio::test]
    async fn test_rejected_conversion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/invoices/inv_42"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such invoice"))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .convert_to_request(&InvoiceId::new("inv_42".to_string()))
            .await;

        assert!(matches!(
            result,
            Err(SubmissionError::Rejected { status: 404, .. })
        ));
    }
}

// ============================================================================
// Debug formatting tests
// ============================================================================

mod debug_formatting_tests {
    use super::*;

    /// The API key never appears in debug output.
    #[test]
    fn test_debug_redacts_api_key() {
        let client = RequestFinanceClient::new(reqwest::Client::new(), "rf-secret".to_string());
        let debug_str = format!("{:?}", client);

        assert!(!debug_str.contains("rf-secret"));
        assert!(debug_str.contains("<REDACTED>"));
    }
}
