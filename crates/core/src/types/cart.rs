//! Cart line items and their aggregation into stock decrements.
//!
//! A checkout cart may list the same product/size more than once (e.g. added
//! from two different pages). Before touching the store, lines are collapsed
//! into one [`AggregatedStockEntry`] per [`StockKey`], in first-seen order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::stock::StockKey;

/// Product IDs with this prefix are pseudo-products (bundled assets, gift
/// wrap, etc.) that have no stock records.
pub const RESERVED_PRODUCT_PREFIX: &str = "assets/";

/// Returns `true` if the product ID refers to a stock-tracked product.
///
/// Empty IDs and IDs starting with [`RESERVED_PRODUCT_PREFIX`] are not.
#[must_use]
pub fn is_stock_product(product_id: &str) -> bool {
    !product_id.is_empty() && !product_id.starts_with(RESERVED_PRODUCT_PREFIX)
}

/// A validated cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    /// Product document ID (already trimmed).
    pub product_id: String,
    /// Size of the purchased variant.
    pub size: i64,
    /// Units purchased; always positive for validated lines.
    pub quantity: u64,
    /// Display title, if the client sent one.
    pub title: Option<String>,
}

impl CartLineItem {
    /// Create a new cart line.
    #[must_use]
    pub fn new(product_id: impl Into<String>, size: i64, quantity: u64) -> Self {
        Self {
            product_id: product_id.into(),
            size,
            quantity,
            title: None,
        }
    }

    /// Set the display title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Stock key this line decrements.
    #[must_use]
    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id.clone(), self.size)
    }
}

/// One product/size worth of stock to take, summed over all cart lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedStockEntry {
    /// Stock record this entry decrements.
    pub key: StockKey,
    /// Total units requested across all lines for this key.
    pub quantity: u64,
    /// Title from the first line seen for this key.
    pub title: String,
    /// Human-readable label used in error messages, e.g. `Runner (size 42)`.
    pub label: String,
}

impl AggregatedStockEntry {
    fn from_line(line: CartLineItem) -> Self {
        let key = line.key();
        let title = line.title.unwrap_or_else(|| line.product_id.clone());
        let label = format!("{title} (size {})", line.size);
        Self {
            key,
            quantity: line.quantity,
            title,
            label,
        }
    }
}

/// Cart lines collapsed by [`StockKey`], preserving first-seen order.
#[derive(Debug, Clone, Default)]
pub struct AggregatedStock {
    entries: Vec<AggregatedStockEntry>,
    index: HashMap<StockKey, usize>,
}

impl AggregatedStock {
    /// Create an empty aggregation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cart line.
    ///
    /// Non-stock lines (see [`is_stock_product`]) are skipped silently. A key
    /// seen before only has its quantity increased; the first line's title
    /// and label are kept. Keys compare as `(product_id, size)` pairs, so
    /// `("a", -1)` and `("a-", 1)` stay apart even though both display as
    /// `a--1`.
    pub fn add(&mut self, line: CartLineItem) {
        if !is_stock_product(&line.product_id) {
            return;
        }

        let key = line.key();
        if let Some(entry) = self
            .index
            .get(&key)
            .and_then(|&position| self.entries.get_mut(position))
        {
            entry.quantity = entry.quantity.saturating_add(line.quantity);
            return;
        }

        self.index.insert(key, self.entries.len());
        self.entries.push(AggregatedStockEntry::from_line(line));
    }

    /// Number of distinct stock records touched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no stock records are touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the entry for a key.
    #[must_use]
    pub fn get(&self, key: &StockKey) -> Option<&AggregatedStockEntry> {
        self.index
            .get(key)
            .and_then(|&position| self.entries.get(position))
    }

    /// Iterate entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &AggregatedStockEntry> {
        self.entries.iter()
    }
}

impl FromIterator<CartLineItem> for AggregatedStock {
    fn from_iter<I: IntoIterator<Item = CartLineItem>>(iter: I) -> Self {
        let mut stock = Self::new();
        for line in iter {
            stock.add(line);
        }
        stock
    }
}

impl<'a> IntoIterator for &'a AggregatedStock {
    type Item = &'a AggregatedStockEntry;
    type IntoIter = std::slice::Iter<'a, AggregatedStockEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
