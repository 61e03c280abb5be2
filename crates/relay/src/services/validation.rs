//! Request body validation.
//!
//! Bodies are parsed as loose JSON first and then checked field by field, so
//! a wrong type in one field yields that field's message rather than a
//! generic deserialization error.
//!
//! Stock items are classified one at a time into an [`ItemOutcome`]. Items
//! without a usable product ID are skipped before their numbers are looked
//! at; the first item with bad numbers rejects the whole request.

use checkout_relay_core::{
    Amount, CartLineItem, CurrencyCode, PaymentIntentRequest, is_stock_product,
};
use serde_json::{Map, Value};
use thiserror::Error;

/// Largest integer a JSON number can carry without losing precision.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Client input errors, each carrying the message returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid JSON body.")]
    InvalidJson,
    #[error("Invalid amount. Must be integer > 0.")]
    InvalidAmount,
    #[error("Invalid currency.")]
    InvalidCurrency,
    #[error("Invalid items payload.")]
    InvalidItems,
    #[error("Invalid product size/quantity.")]
    InvalidItem,
}

/// Result of checking one raw cart item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Not a stock product; ignored.
    Skip,
    /// A well-formed stock line.
    Valid(CartLineItem),
    /// Stock product with a non-integer size or a non-positive quantity.
    Reject,
}

/// Parse a request body. An empty body counts as `{}`.
///
/// # Errors
///
/// Returns `ValidationError::InvalidJson` if the body is not valid JSON.
pub fn parse_body(bytes: &[u8]) -> Result<Value, ValidationError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(bytes).map_err(|_| ValidationError::InvalidJson)
}

/// Validate a `/payment-intent` body.
///
/// # Errors
///
/// Returns `InvalidAmount` unless `amount` is a positive integer, then
/// `InvalidCurrency` unless `currency` is a non-empty string.
pub fn validate_payment_request(body: &Value) -> Result<PaymentIntentRequest, ValidationError> {
    let amount = body
        .get("amount")
        .and_then(integer_amount)
        .and_then(|minor_units| Amount::new(minor_units).ok())
        .ok_or(ValidationError::InvalidAmount)?;

    let currency = body
        .get("currency")
        .and_then(Value::as_str)
        .and_then(|s| CurrencyCode::parse(s).ok())
        .ok_or(ValidationError::InvalidCurrency)?;

    Ok(PaymentIntentRequest {
        amount,
        currency,
        customer_email: string_field(body, "customerEmail"),
        customer_name: string_field(body, "customerName"),
    })
}

/// Validate a `/decrease-stock` body into its stock lines, in request order.
///
/// # Errors
///
/// Returns `InvalidItems` unless `items` is a non-empty array, and
/// `InvalidItem` for the first stock item with bad numbers.
pub fn validate_stock_request(body: &Value) -> Result<Vec<CartLineItem>, ValidationError> {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
        .ok_or(ValidationError::InvalidItems)?;

    let mut lines = Vec::with_capacity(items.len());
    for raw in items {
        match classify_item(raw) {
            ItemOutcome::Skip => {}
            ItemOutcome::Valid(line) => lines.push(line),
            ItemOutcome::Reject => return Err(ValidationError::InvalidItem),
        }
    }
    Ok(lines)
}

/// Classify one raw cart item.
///
/// The product ID is checked first: a missing, blank or reserved ID skips
/// the item whatever its size and quantity. `size` and `quantity` are coerced
/// the way a browser would coerce form values, so `"42"` is accepted.
#[must_use]
pub fn classify_item(raw: &Value) -> ItemOutcome {
    let product_id = raw
        .get("productId")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();

    if !is_stock_product(product_id) {
        return ItemOutcome::Skip;
    }

    let size = raw.get("size").and_then(coerce_integer);
    let quantity = raw
        .get("quantity")
        .and_then(coerce_integer)
        .and_then(|q| u64::try_from(q).ok())
        .filter(|q| *q > 0);

    let (Some(size), Some(quantity)) = (size, quantity) else {
        return ItemOutcome::Reject;
    };

    let line = CartLineItem::new(product_id, size, quantity);
    match raw.get("title").and_then(Value::as_str) {
        Some(title) => ItemOutcome::Valid(line.with_title(title)),
        None => ItemOutcome::Valid(line),
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// A string field, or `None` if absent or not a string.
fn string_field(body: &Value, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(String::from)
}

/// A JSON number with an integral value, as an amount in minor units.
///
/// Only real numbers count; `"100"` is not an amount.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // range checked
fn integer_amount(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let n = value.as_f64()?;
    if n.fract() != 0.0 || n <= 0.0 || n > MAX_SAFE_INTEGER {
        return None;
    }
    Some(n as u64)
}

/// Coerce a value to an integer the way JavaScript's `Number()` does, then
/// require the result to be a whole number.
#[allow(clippy::cast_possible_truncation)] // range checked
fn coerce_integer(value: &Value) -> Option<i64> {
    let n = coerce_number(value)?;
    if !n.is_finite() || n.fract() != 0.0 || n.abs() > MAX_SAFE_INTEGER {
        return None;
    }
    Some(n as i64)
}

/// `Number(value)`; `None` stands for `NaN`.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_numeric_string(s),
        Value::Array(items) => match items.as_slice() {
            [] => Some(0.0),
            [single] if !single.is_array() && !single.is_object() => {
                coerce_number(&Value::String(display_string(single)))
            }
            _ => None,
        },
        Value::Object(_) => None,
    }
}

/// String form of a scalar, as array-to-string conversion produces it.
fn display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[allow(clippy::cast_precision_loss)] // callers check against MAX_SAFE_INTEGER
fn parse_numeric_string(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Some(0.0);
    }

    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(digits) = s
            .strip_prefix(prefix)
            .or_else(|| s.strip_prefix(&prefix.to_uppercase()))
        {
            return u64::from_str_radix(digits, radix).ok().map(|n| n as f64);
        }
    }

    // Rust accepts "inf" and "NaN" spellings that Number() does not; neither
    // is a whole number, so both end up rejected either way.
    s.parse::<f64>().ok()
}
