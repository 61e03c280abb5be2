//! Stock record identity.
//!
//! Stock lives in the document store as `products/{product_id}/stocks/{size}`
//! with a numeric `qty` field. [`StockKey`] is the in-process handle for one
//! such document.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one stock record: a product in a given size.
///
/// Displays as `{product_id}-{size}`, the key format used for cart
/// aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    /// Product document ID.
    pub product_id: String,
    /// Size (shoe size, etc.); the stock document ID is its decimal form.
    pub size: i64,
}

impl StockKey {
    /// Create a new stock key.
    #[must_use]
    pub fn new(product_id: impl Into<String>, size: i64) -> Self {
        Self {
            product_id: product_id.into(),
            size,
        }
    }

    /// Document ID of the stock record within the product's `stocks` collection.
    #[must_use]
    pub fn size_document_id(&self) -> String {
        self.size.to_string()
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.product_id, self.size)
    }
}

/// Current state of a stock record as read inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    /// Units on hand.
    pub qty: i64,
}

impl StockRecord {
    /// Create a stock record with the given quantity.
    #[must_use]
    pub const fn new(qty: i64) -> Self {
        Self { qty }
    }

    /// Whether `requested` units can be taken from this record.
    #[must_use]
    pub fn can_fulfil(&self, requested: u64) -> bool {
        u64::try_from(self.qty).is_ok_and(|qty| qty >= requested)
    }
}
