//! Firestore REST wire types.
//!
//! Only the handful of shapes the stock transaction needs: documents with a
//! `qty` field, write requests, and Google API error bodies.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::store::StoreError;

/// Name of the quantity field on stock documents.
pub const QTY_FIELD: &str = "qty";

/// A document as returned by `documents.get`.
#[derive(Debug, Deserialize)]
pub struct Document {
    pub name: String,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
}

impl Document {
    /// Quantity stored on the document.
    ///
    /// Integer and whole double values are accepted, as are numeric
    /// strings. A missing, null or non-numeric field counts as 0.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Parse` for a fractional quantity.
    pub fn qty(&self) -> Result<i64, StoreError> {
        self.fields
            .get(QTY_FIELD)
            .map_or(Ok(0), numeric_value)
            .map_err(|n| StoreError::Parse(format!("{} has fractional qty {n}", self.name)))
    }
}

/// Interpret a Firestore `Value` as an integer; a fractional number is
/// returned as the error.
fn numeric_value(value: &Value) -> Result<i64, f64> {
    if let Some(n) = value.get("integerValue") {
        // integerValue is encoded as a JSON string, but accept a number too
        return Ok(n
            .as_str()
            .and_then(|s| s.parse().ok())
            .or_else(|| n.as_i64())
            .unwrap_or(0));
    }
    if let Some(d) = value.get("doubleValue").and_then(Value::as_f64) {
        return whole(d);
    }
    if let Some(s) = value.get("stringValue").and_then(Value::as_str) {
        return s.trim().parse::<f64>().map_or(Ok(0), whole);
    }
    Ok(0)
}

#[allow(clippy::cast_possible_truncation)] // fraction checked, cast saturates
fn whole(d: f64) -> Result<i64, f64> {
    if !d.is_finite() {
        return Ok(0);
    }
    if d.fract() != 0.0 {
        return Err(d);
    }
    Ok(d as i64)
}

/// A write that sets a stock document's quantity, failing if it was deleted.
#[must_use]
pub fn qty_update(document_name: &str, qty: i64) -> Value {
    json!({
        "update": {
            "name": document_name,
            "fields": {
                QTY_FIELD: { "integerValue": qty.to_string() }
            }
        },
        "updateMask": { "fieldPaths": [QTY_FIELD] },
        "currentDocument": { "exists": true }
    })
}

/// Google API error envelope.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Turn a failed Firestore response into a `StoreError`.
///
/// `ABORTED` (HTTP 409) means the transaction lost a race and may be retried.
pub async fn error_from_response(response: reqwest::Response) -> StoreError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    let (message, grpc_status) = serde_json::from_str::<ErrorBody>(&text).map_or_else(
        |_| (text.clone(), String::new()),
        |body| (body.error.message, body.error.status),
    );

    if grpc_status == "ABORTED" || status == reqwest::StatusCode::CONFLICT {
        return StoreError::Contention(message);
    }

    StoreError::Api {
        status: status.as_u16(),
        message,
    }
}
