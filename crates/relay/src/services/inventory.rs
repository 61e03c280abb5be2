//! Stock decrements.
//!
//! All aggregated entries are checked and decremented inside one store
//! transaction: either every entry has enough stock and all of them are
//! written, or nothing is.

use async_trait::async_trait;
use checkout_relay_core::{AggregatedStock, StockRecord};
use thiserror::Error;
use tracing::instrument;

use crate::store::{StockStore, StockTransaction, StoreError, TransactionBody, run_transaction};

/// Why a stock decrement was refused.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// No stock record exists for the item.
    #[error("{label} is not available in stock.")]
    MissingStock { label: String },

    /// The record holds fewer units than requested.
    #[error("Insufficient stock for {label}. Available: {available}, requested: {requested}.")]
    InsufficientStock {
        label: String,
        available: i64,
        requested: u64,
    },

    /// The store failed or the retry budget ran out.
    #[error("Stock store error: {0}")]
    Store(#[from] StoreError),
}

impl TransactionError {
    /// Whether the refusal is about the cart contents rather than the store.
    #[must_use]
    pub const fn is_domain(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

/// Read, check, and stage a decrement for every entry.
struct StockDecrement<'a> {
    stock: &'a AggregatedStock,
}

#[async_trait]
impl TransactionBody for StockDecrement<'_> {
    type Output = usize;
    type Error = TransactionError;

    async fn run(&self, tx: &mut dyn StockTransaction) -> Result<usize, TransactionError> {
        for entry in self.stock {
            let record = tx
                .read(&entry.key)
                .await?
                .ok_or_else(|| TransactionError::MissingStock {
                    label: entry.label.clone(),
                })?;

            if !record.can_fulfil(entry.quantity) {
                return Err(TransactionError::InsufficientStock {
                    label: entry.label.clone(),
                    available: record.qty,
                    requested: entry.quantity,
                });
            }

            // can_fulfil guarantees quantity <= qty <= i64::MAX
            let requested = i64::try_from(entry.quantity).unwrap_or(i64::MAX);
            tx.stage_write(&entry.key, StockRecord::new(record.qty - requested));
        }

        Ok(self.stock.len())
    }

    fn should_retry(&self, error: &TransactionError) -> bool {
        matches!(error, TransactionError::Store(err) if err.is_contention())
    }
}

/// Decrement every aggregated entry in one transaction.
///
/// Returns the number of entries updated. An empty aggregation succeeds
/// without touching the store.
///
/// # Errors
///
/// Returns `MissingStock` or `InsufficientStock` for the first entry that
/// cannot be fulfilled, or `Store` if the transaction itself failed. In every
/// error case no stock has been changed.
#[instrument(skip(store, stock), fields(store = store.name(), entries = stock.len()))]
pub async fn decrease_stock(
    store: &dyn StockStore,
    stock: &AggregatedStock,
) -> Result<usize, TransactionError> {
    if stock.is_empty() {
        return Ok(0);
    }

    let updated = run_transaction(store, &StockDecrement { stock }).await?;
    tracing::info!(updated, "Stock decremented");
    Ok(updated)
}
