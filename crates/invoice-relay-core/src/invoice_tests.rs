//! Tests for invoice normalization, fallback resolution, and the ledger
//! wire shape.

use super::*;
use crate::extraction::RawInvoice;
use serde_json::json;

// ============================================================================
// Helpers
// ============================================================================

fn fixed_now() -> DateTime<Utc> {
    // 2024-05-01T12:30:45.987Z — sub-second precision must be dropped.
    DateTime::from_timestamp(1_714_566_645, 987_000_000).unwrap()
}

fn number() -> InvoiceNumber {
    InvoiceNumber::new("A12345".to_string())
}

// ============================================================================
// build_document tests
// ============================================================================

mod build_document_tests {
    use super::*;

    /// The round-trip property: one Chair at $50 x2 becomes one USD line
    /// item named "Chair", quantity 2, 5000 cents, buyer a@b.com.
    #[test]
    fn test_round_trip_single_item() {
        let raw = RawInvoice::new(json!({
            "recipient_email": "a@b.com",
            "items": [{"item": "Chair", "quantity": 2, "price": 50}]
        }));

        let doc = build_document(&raw, number(), fixed_now()).unwrap();

        assert_eq!(doc.invoice_items.len(), 1);
        let item = &doc.invoice_items[0];
        assert_eq!(item.name, "Chair");
        assert_eq!(item.quantity.as_u64(), Some(2));
        assert_eq!(item.unit_price, 5000);
        assert_eq!(item.currency, ITEM_CURRENCY);
        assert_eq!(item.tax, TaxDescriptor::default());
        assert_eq!(doc.buyer_info.email.as_deref(), Some("a@b.com"));
        assert_eq!(doc.payment_address, PAYMENT_ADDRESS);
        assert_eq!(doc.payment_currency, PAYMENT_CURRENCY);
    }

    /// Creation and due timestamps are second-truncated with the fixed
    /// millisecond suffix, and due is exactly 31 days after creation.
    #[test]
    fn test_due_date_offset_and_formatting() {
        let raw = RawInvoice::new(json!({"items": [{"name": "X", "quantity": 1, "price": 1}]}));

        let doc = build_document(&raw, number(), fixed_now()).unwrap();

        assert_eq!(doc.creation_date.to_wire(), "2024-05-01T12:30:45.000Z");
        assert_eq!(doc.payment_terms.due_date.to_wire(), "2024-06-01T12:30:45.000Z");

        let delta = *doc.payment_terms.due_date.as_datetime() - *doc.creation_date.as_datetime();
        assert_eq!(delta, Duration::days(DUE_DATE_OFFSET_DAYS));
    }

    /// A raw structure with no line-item collection at all fails with
    /// `MissingItems` and produces no partial document.
    #[test]
    fn test_missing_items_collection() {
        let raw = RawInvoice::new(json!({"recipient_email": "a@b.com"}));
        let result = build_document(&raw, number(), fixed_now());
        assert_eq!(result.unwrap_err(), MalformedExtraction::MissingItems);
    }

    /// A present-but-empty item array gives no structural basis either.
    #[test]
    fn test_empty_items_collection() {
        let raw = RawInvoice::new(json!({"items": []}));
        let result = build_document(&raw, number(), fixed_now());
        assert_eq!(result.unwrap_err(), MalformedExtraction::MissingItems);
    }

    /// The buyer email fallback chain tries `recipient_email`, `email`, then
    /// `recipient`.
    #[test]
    fn test_buyer_email_fallbacks() {
        for (body, expected) in [
            (json!({"recipient_email": "a@b.com", "email": "x@y.com"}), Some("a@b.com")),
            (json!({"email": "x@y.com", "recipient": "z@w.com"}), Some("x@y.com")),
            (json!({"recipient": "z@w.com"}), Some("z@w.com")),
            (json!({}), None),
        ] {
            let mut value = body;
            value["items"] = json!([{"name": "X", "quantity": 1, "price": 1}]);
            let doc = build_document(&RawInvoice::new(value), number(), fixed_now()).unwrap();
            assert_eq!(doc.buyer_info.email.as_deref(), expected);
        }
    }

    /// A wholly absent buyer email is not a hard failure; the document is
    /// still built and the null lands on the wire for the ledger to judge.
    #[test]
    fn test_absent_email_serializes_null() {
        let raw = RawInvoice::new(json!({"items": [{"name": "X", "quantity": 1, "price": 1}]}));
        let doc = build_document(&raw, number(), fixed_now()).unwrap();

        let wire = serde_json::to_value(&doc).unwrap();
        assert_eq!(wire["buyerInfo"]["email"], json!(null));
    }

    /// Fractional quantities are copied verbatim.
    #[test]
    fn test_fractional_quantity_preserved() {
        let raw = RawInvoice::new(json!({"items": [{"name": "Hours", "quantity": 2.5, "price": 80}]}));
        let doc = build_document(&raw, number(), fixed_now()).unwrap();

        assert_eq!(doc.invoice_items[0].quantity.as_f64(), Some(2.5));
        assert_eq!(doc.invoice_items[0].unit_price, 8000);
    }

    /// Fractional major-unit prices scale by 100 with plain rounding.
    #[test]
    fn test_fractional_price_scaling() {
        let raw = RawInvoice::new(json!({"items": [{"name": "X", "quantity": 1, "price": 19.99}]}));
        let doc = build_document(&raw, number(), fixed_now()).unwrap();
        assert_eq!(doc.invoice_items[0].unit_price, 1999);
    }
}

// ============================================================================
// Line-item validation tests
// ============================================================================

mod item_validation_tests {
    use super::*;

    /// An item whose only label is `description` resolves through the chain.
    #[test]
    fn test_description_fallback() {
        let raw = RawInvoice::new(json!({
            "items": [{"description": "Desk", "quantity": 1, "price": 10}]
        }));

        let doc = build_document(&raw, number(), fixed_now()).unwrap();
        assert_eq!(doc.invoice_items[0].name, "Desk");
    }

    /// `item` beats the other candidates when several are present.
    #[test]
    fn test_item_field_wins() {
        let raw = RawInvoice::new(json!({
            "items": [{"item": "Label", "name": "Name", "description": "Desc",
                       "quantity": 1, "price": 10}]
        }));

        let doc = build_document(&raw, number(), fixed_now()).unwrap();
        assert_eq!(doc.invoice_items[0].name, "Label");
    }

    /// An item with no name candidate at all fails normalization; the
    /// resolved-name invariant forbids a null name on the wire.
    #[test]
    fn test_unnamed_item_rejected() {
        let raw = RawInvoice::new(json!({
            "items": [
                {"name": "Fine", "quantity": 1, "price": 1},
                {"quantity": 3, "price": 7}
            ]
        }));

        let result = build_document(&raw, number(), fixed_now());
        assert_eq!(result.unwrap_err(), MalformedExtraction::UnnamedItem { index: 1 });
    }

    /// Missing or non-numeric quantity and price fail with the field named.
    #[test]
    fn test_non_numeric_fields_rejected() {
        let cases = [
            (json!({"name": "X", "price": 1}), "quantity"),
            (json!({"name": "X", "quantity": "two", "price": 1}), "quantity"),
            (json!({"name": "X", "quantity": 1}), "price"),
            (json!({"name": "X", "quantity": 1, "price": "fifty"}), "price"),
        ];

        for (item, field) in cases {
            let raw = RawInvoice::new(json!({"items": [item]}));
            let result = build_document(&raw, number(), fixed_now());
            assert_eq!(
                result.unwrap_err(),
                MalformedExtraction::NonNumericField { index: 0, field },
            );
        }
    }
}

// ============================================================================
// Wire shape tests
// ============================================================================

mod wire_shape_tests {
    use super::*;

    /// The serialized document uses the exact ledger field names.
    #[test]
    fn test_wire_field_names() {
        let raw = RawInvoice::new(json!({
            "recipient_email": "a@b.com",
            "items": [{"item": "Chair", "quantity": 2, "price": 50}]
        }));
        let doc = build_document(&raw, number(), fixed_now()).unwrap();

        let wire = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            wire,
            json!({
                "creationDate": "2024-05-01T12:30:45.000Z",
                "invoiceItems": [{
                    "currency": "USD",
                    "name": "Chair",
                    "quantity": 2,
                    "unitPrice": 5000,
                    "tax": {"type": "fixed", "amount": "0"}
                }],
                "invoiceNumber": "A12345",
                "buyerInfo": {"email": "a@b.com"},
                "paymentTerms": {"dueDate": "2024-06-01T12:30:45.000Z"},
                "paymentAddress": PAYMENT_ADDRESS,
                "paymentCurrency": PAYMENT_CURRENCY
            })
        );
    }
}

// ============================================================================
// Invoice number tests
// ============================================================================

mod invoice_number_tests {
    use super::*;

    /// Generated numbers carry the `A` prefix and stay in the documented
    /// random range.
    #[test]
    fn test_random_number_shape() {
        let generator = RandomInvoiceNumber;
        for _ in 0..100 {
            let n = generator.generate();
            let digits: u32 = n.as_str().strip_prefix('A').unwrap().parse().unwrap();
            assert!((2_000..=9_000_000).contains(&digits), "out of range: {n}");
        }
    }
}

// ============================================================================
// InvoiceNormalizer tests
// ============================================================================

mod normalizer_tests {
    use super::*;

    /// The production normalizer wires the generator through and stamps a
    /// current creation date.
    #[test]
    fn test_normalize_uses_generator_and_clock() {
        struct FixedNumber;
        impl InvoiceNumberGenerator for FixedNumber {
            fn generate(&self) -> InvoiceNumber {
                InvoiceNumber::new("A999".to_string())
            }
        }

        let normalizer = InvoiceNormalizer::new(Arc::new(FixedNumber));
        let raw = RawInvoice::new(json!({"items": [{"name": "X", "quantity": 1, "price": 1}]}));

        let before = Utc::now();
        let doc = normalizer.normalize(&raw).unwrap();
        let after = Utc::now();

        assert_eq!(doc.invoice_number.as_str(), "A999");
        let created = *doc.creation_date.as_datetime();
        assert!(created >= WireTimestamp::from_datetime(before).as_datetime().to_owned());
        assert!(created <= after);
    }
}
