//! Invoice normalization and the ledger wire data model.
//!
//! Converts the untrusted [`RawInvoice`] produced by the extraction oracle
//! into a validated, fully populated [`InvoiceDocument`] ready for
//! submission. Normalization is a pure transformation apart from one read of
//! the current time and one invoice-number draw, both injected so the
//! algorithm itself stays deterministic and testable.

use crate::extraction::RawInvoice;
use chrono::{DateTime, Duration, Timelike, Utc};
use rand::Rng;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Fixed currency code applied to every normalized line item.
pub const ITEM_CURRENCY: &str = "USD";

/// Fixed payment address attached to every invoice document.
pub const PAYMENT_ADDRESS: &str = "0x4886E85E192cdBC81d42D89256a81dAb990CDD74";

/// Fixed settlement currency attached to every invoice document.
pub const PAYMENT_CURRENCY: &str = "USDC-matic";

/// Due date offset: due = creation + this many days.
pub const DUE_DATE_OFFSET_DAYS: i64 = 31;

/// Fallback chain for a line item's name, first present wins.
const ITEM_NAME_FIELDS: [&str; 3] = ["item", "description", "name"];

/// Fallback chain for the buyer email, first present wins.
const BUYER_EMAIL_FIELDS: [&str; 3] = ["recipient_email", "email", "recipient"];

// ============================================================================
// Wire timestamp
// ============================================================================

/// UTC timestamp in the ledger wire format.
///
/// Truncated to whole seconds and rendered with a fixed millisecond suffix:
/// `2024-05-01T12:30:45.000Z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireTimestamp(DateTime<Utc>);

impl WireTimestamp {
    /// Build from a datetime, dropping sub-second precision.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.with_nanosecond(0).unwrap_or(dt))
    }

    /// The timestamp shifted forward by a number of days, same truncation.
    pub fn plus_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    /// Render the wire string, e.g. `2024-05-01T12:30:45.000Z`.
    pub fn to_wire(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%S.000Z").to_string()
    }

    /// The underlying datetime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl fmt::Display for WireTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}

impl Serialize for WireTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_wire())
    }
}

// ============================================================================
// Invoice number
// ============================================================================

/// Generated invoice number, e.g. `A4815162`.
///
/// Numbers are drawn independently per request from a bounded random range.
/// The design does not deduplicate against the ledger service, so collision
/// is possible and accepted; the ledger is the system of record for
/// uniqueness complaints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceNumber(String);

impl InvoiceNumber {
    /// Wrap an already formatted number.
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Get string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strategy seam for invoice-number generation.
///
/// The default is random and collision-prone by design; deployments that
/// need stronger guarantees plug in their own implementation instead of the
/// semantics being changed silently.
pub trait InvoiceNumberGenerator: Send + Sync {
    /// Draw the next invoice number.
    fn generate(&self) -> InvoiceNumber;
}

/// Default generator: `"A"` plus a random integer in `[2000, 9000000]`.
#[derive(Debug, Default)]
pub struct RandomInvoiceNumber;

impl InvoiceNumberGenerator for RandomInvoiceNumber {
    fn generate(&self) -> InvoiceNumber {
        let n: u32 = rand::thread_rng().gen_range(2_000..=9_000_000);
        InvoiceNumber(format!("A{n}"))
    }
}

// ============================================================================
// Wire document types
// ============================================================================

/// Zero-amount fixed-type tax descriptor attached to every line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: String,
}

impl Default for TaxDescriptor {
    fn default() -> Self {
        Self {
            kind: "fixed".to_string(),
            amount: "0".to_string(),
        }
    }
}

/// One normalized invoice line item in ledger wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub currency: String,
    pub name: String,
    /// Quantity copied verbatim from the raw item (integer or fractional).
    pub quantity: Number,
    /// Unit price in minor currency units (integer cents).
    pub unit_price: i64,
    pub tax: TaxDescriptor,
}

/// Buyer record with the resolved email, when one was present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuyerInfo {
    pub email: Option<String>,
}

/// Payment terms carrying the computed due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTerms {
    pub due_date: WireTimestamp,
}

/// Trusted, schema-complete invoice document in ledger wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDocument {
    pub creation_date: WireTimestamp,
    pub invoice_items: Vec<InvoiceItem>,
    pub invoice_number: InvoiceNumber,
    pub buyer_info: BuyerInfo,
    pub payment_terms: PaymentTerms,
    pub payment_address: String,
    pub payment_currency: String,
}

// ============================================================================
// Error Types
// ============================================================================

/// The oracle returned a structurally incomplete result.
///
/// Distinct from [`crate::ExtractionError`]: the oracle answered, but what it
/// answered cannot be turned into an invoice. The pipeline aborts without a
/// partial document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedExtraction {
    /// The raw structure has no line-item collection at all, or an empty one.
    #[error("extracted structure has no line items")]
    MissingItems,

    /// A line item resolved to no name through the whole fallback chain.
    #[error("line item {index} has no usable name")]
    UnnamedItem { index: usize },

    /// A numeric line-item field is missing or wrongly typed.
    #[error("line item {index} field '{field}' is missing or not a number")]
    NonNumericField { index: usize, field: &'static str },
}

// ============================================================================
// Fallback resolution
// ============================================================================

/// Resolve the first present string among `fields` on a JSON object.
///
/// This is the ordered first-match-wins accessor chain used for both item
/// names and buyer emails.
fn resolve_field<'a>(value: &'a Value, fields: &[&str]) -> Option<&'a str> {
    fields.iter().find_map(|f| value.get(*f).and_then(Value::as_str))
}

/// Resolve a line item's human-readable name: `item`, then `description`,
/// then `name`.
pub fn resolve_item_name(item: &Value) -> Option<&str> {
    resolve_field(item, &ITEM_NAME_FIELDS)
}

/// Resolve the buyer email from the top-level raw structure:
/// `recipient_email`, then `email`, then `recipient`.
///
/// All absent is not an error here; the document is submitted without a
/// buyer email and the ledger service decides whether that is acceptable.
pub fn resolve_buyer_email(raw: &Value) -> Option<&str> {
    resolve_field(raw, &BUYER_EMAIL_FIELDS)
}

// ============================================================================
// Normalization
// ============================================================================

/// Build a normalized document from a raw extraction at an explicit time
/// with an explicit invoice number.
///
/// Pure: same inputs, same document. [`InvoiceNormalizer`] supplies the
/// clock and number draw for production use.
pub fn build_document(
    raw: &RawInvoice,
    number: InvoiceNumber,
    now: DateTime<Utc>,
) -> Result<InvoiceDocument, MalformedExtraction> {
    let items = raw.items().ok_or(MalformedExtraction::MissingItems)?;
    if items.is_empty() {
        return Err(MalformedExtraction::MissingItems);
    }

    let invoice_items = items
        .iter()
        .enumerate()
        .map(|(index, item)| normalize_item(index, item))
        .collect::<Result<Vec<_>, _>>()?;

    let creation = WireTimestamp::from_datetime(now);

    Ok(InvoiceDocument {
        creation_date: creation,
        invoice_items,
        invoice_number: number,
        buyer_info: BuyerInfo {
            email: resolve_buyer_email(raw.as_value()).map(str::to_string),
        },
        payment_terms: PaymentTerms {
            due_date: creation.plus_days(DUE_DATE_OFFSET_DAYS),
        },
        payment_address: PAYMENT_ADDRESS.to_string(),
        payment_currency: PAYMENT_CURRENCY.to_string(),
    })
}

/// Normalize one raw line item.
///
/// Name comes from the fallback chain, the currency is fixed, the unit price
/// is scaled to integer minor units (`price * 100`, standard numeric
/// multiplication, amounts assumed in whole major units), quantity is copied
/// verbatim, and the zero tax descriptor is attached.
fn normalize_item(index: usize, item: &Value) -> Result<InvoiceItem, MalformedExtraction> {
    let name = resolve_item_name(item)
        .ok_or(MalformedExtraction::UnnamedItem { index })?
        .to_string();

    let quantity = item
        .get("quantity")
        .and_then(Value::as_number)
        .cloned()
        .ok_or(MalformedExtraction::NonNumericField {
            index,
            field: "quantity",
        })?;

    let price = item
        .get("price")
        .and_then(Value::as_f64)
        .ok_or(MalformedExtraction::NonNumericField {
            index,
            field: "price",
        })?;

    Ok(InvoiceItem {
        currency: ITEM_CURRENCY.to_string(),
        name,
        quantity,
        unit_price: (price * 100.0).round() as i64,
        tax: TaxDescriptor::default(),
    })
}

/// Production normalizer: pairs [`build_document`] with a clock read and a
/// pluggable invoice-number draw.
pub struct InvoiceNormalizer {
    number_generator: Arc<dyn InvoiceNumberGenerator>,
}

impl InvoiceNormalizer {
    /// Create a normalizer with the given number-generation strategy.
    pub fn new(number_generator: Arc<dyn InvoiceNumberGenerator>) -> Self {
        Self { number_generator }
    }

    /// Normalize a raw extraction into a submission-ready document.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedExtraction`] when the raw structure lacks a
    /// line-item collection or a line item cannot be resolved; no partial
    /// document is produced.
    #[instrument(skip(self, raw))]
    pub fn normalize(&self, raw: &RawInvoice) -> Result<InvoiceDocument, MalformedExtraction> {
        build_document(raw, self.number_generator.generate(), Utc::now())
    }
}

impl fmt::Debug for InvoiceNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvoiceNormalizer").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "invoice_tests.rs"]
mod tests;
