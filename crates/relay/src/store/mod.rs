//! Transactional stock store abstraction.
//!
//! # Architecture
//!
//! - [`StockStore`] opens transactions; [`StockTransaction`] reads records,
//!   stages writes locally and commits them atomically.
//! - [`run_transaction`] drives a [`TransactionBody`] through
//!   begin → run → commit, rolling back on failure and retrying when the
//!   store reports contention (bounded by [`StockStore::max_attempts`]).
//! - [`StoreSlot`] holds the process-wide store handle; it is initialized at
//!   most once and handed to request handlers through `AppState`.
//!
//! Implementations:
//! - [`crate::firestore::FirestoreStore`] - Cloud Firestore over REST
//! - [`memory::MemoryStockStore`] - in-process store with optimistic
//!   concurrency, used by tests

pub mod memory;

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use checkout_relay_core::{StockKey, StockRecord};
use thiserror::Error;

pub use memory::MemoryStockStore;

/// Attempts per transaction, matching the Firestore client libraries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Errors raised by a stock store or one of its transactions.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Could not obtain an access token.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Store API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Transaction lost a race with a concurrent writer.
    #[error("Transaction contention: {0}")]
    Contention(String),

    /// Response could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Key cannot be addressed in this store.
    #[error("Invalid stock key: {0}")]
    InvalidKey(String),
}

impl StoreError {
    /// Whether the failed transaction may succeed if run again.
    #[must_use]
    pub const fn is_contention(&self) -> bool {
        matches!(self, Self::Contention(_))
    }
}

/// A store that can run all-or-nothing transactions over stock records.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Open a transaction.
    ///
    /// `retry_of` is the token of a previous attempt that hit contention, if
    /// any; backends that support it use it to keep their place in line.
    async fn begin(
        &self,
        retry_of: Option<String>,
    ) -> Result<Box<dyn StockTransaction>, StoreError>;

    /// How many times [`run_transaction`] may attempt one transaction.
    fn max_attempts(&self) -> u32 {
        DEFAULT_MAX_ATTEMPTS
    }
}

/// An open transaction.
///
/// Reads see the store as of the transaction; writes are only staged until
/// [`StockTransaction::commit`].
#[async_trait]
pub trait StockTransaction: Send {
    /// Read a stock record. `Ok(None)` means the record does not exist.
    async fn read(&mut self, key: &StockKey) -> Result<Option<StockRecord>, StoreError>;

    /// Stage a write replacing the record's quantity.
    fn stage_write(&mut self, key: &StockKey, record: StockRecord);

    /// Apply every staged write atomically.
    async fn commit(&mut self) -> Result<(), StoreError>;

    /// Abandon the transaction, discarding staged writes.
    async fn rollback(&mut self) -> Result<(), StoreError>;

    /// Token identifying this attempt for a retry, if the backend has one.
    fn retry_token(&self) -> Option<String> {
        None
    }
}

/// Work performed inside one transaction attempt.
#[async_trait]
pub trait TransactionBody: Send + Sync {
    type Output: Send;
    type Error: From<StoreError> + Send;

    /// Perform reads and stage writes. Returning `Err` rolls the attempt back.
    async fn run(&self, tx: &mut dyn StockTransaction) -> Result<Self::Output, Self::Error>;

    /// Whether a failed attempt should be run again.
    fn should_retry(&self, error: &Self::Error) -> bool {
        let _ = error;
        false
    }
}

/// Run `body` inside a store transaction.
///
/// Staged writes are committed only if `body` succeeds. Contention at commit
/// (or an error `body` marks retryable) starts a fresh attempt until the
/// store's attempt budget is spent; the last error is returned.
///
/// # Errors
///
/// Returns the body's error, or the store error that ended the final attempt.
pub async fn run_transaction<B>(store: &dyn StockStore, body: &B) -> Result<B::Output, B::Error>
where
    B: TransactionBody,
{
    let max_attempts = store.max_attempts().max(1);
    let mut retry_of = None;
    let mut attempt = 1;

    loop {
        let mut tx = store.begin(retry_of.take()).await?;

        let error = match body.run(tx.as_mut()).await {
            Ok(output) => match tx.commit().await {
                Ok(()) => return Ok(output),
                Err(err) if err.is_contention() && attempt < max_attempts => {
                    tracing::warn!(
                        store = store.name(),
                        attempt,
                        error = %err,
                        "Transaction commit contended, retrying"
                    );
                    retry_of = tx.retry_token();
                    attempt += 1;
                    continue;
                }
                Err(err) => return Err(err.into()),
            },
            Err(error) => error,
        };

        if let Err(rollback_err) = tx.rollback().await {
            tracing::warn!(
                store = store.name(),
                error = %rollback_err,
                "Transaction rollback failed"
            );
        }

        if attempt < max_attempts && body.should_retry(&error) {
            tracing::warn!(store = store.name(), attempt, "Transaction aborted, retrying");
            retry_of = tx.retry_token();
            attempt += 1;
            continue;
        }

        return Err(error);
    }
}

/// Process-wide slot for the stock store handle.
///
/// The first [`StoreSlot::get_or_init`] runs the initializer; every later
/// call returns the same handle (or the same absence) without running it.
#[derive(Default)]
pub struct StoreSlot {
    cell: OnceLock<Option<Arc<dyn StockStore>>>,
}

impl StoreSlot {
    /// Create an empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Return the stored handle, initializing the slot on first use.
    pub fn get_or_init<F>(&self, init: F) -> Option<Arc<dyn StockStore>>
    where
        F: FnOnce() -> Option<Arc<dyn StockStore>>,
    {
        self.cell.get_or_init(init).clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Decrements one key by one unit.
    struct TakeOne(StockKey);

    #[async_trait]
    impl TransactionBody for TakeOne {
        type Output = i64;
        type Error = StoreError;

        async fn run(&self, tx: &mut dyn StockTransaction) -> Result<i64, StoreError> {
            let record = tx
                .read(&self.0)
                .await?
                .ok_or_else(|| StoreError::Parse("missing".to_string()))?;
            tx.stage_write(&self.0, StockRecord::new(record.qty - 1));
            Ok(record.qty - 1)
        }
    }

    #[tokio::test]
    async fn test_run_transaction_commits() {
        let store = MemoryStockStore::new().with_stock("shoe1", 42, 5);
        let key = StockKey::new("shoe1", 42);

        let remaining = run_transaction(&store, &TakeOne(key.clone())).await.unwrap();
        assert_eq!(remaining, 4);
        assert_eq!(store.qty(&key), Some(4));
    }

    #[tokio::test]
    async fn test_run_transaction_rolls_back_on_error() {
        let store = MemoryStockStore::new();
        let result = run_transaction(&store, &TakeOne(StockKey::new("ghost", 1))).await;
        assert!(result.is_err());
        assert_eq!(store.commits(), 0);
    }

    #[tokio::test]
    async fn test_contention_is_retried() {
        let store = MemoryStockStore::new()
            .with_stock("shoe1", 42, 5)
            .with_conflicts(2);
        let key = StockKey::new("shoe1", 42);

        run_transaction(&store, &TakeOne(key.clone())).await.unwrap();
        assert_eq!(store.qty(&key), Some(4));
        assert_eq!(store.transactions_started(), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion_fails() {
        let store = MemoryStockStore::new()
            .with_stock("shoe1", 42, 5)
            .with_conflicts(DEFAULT_MAX_ATTEMPTS);
        let key = StockKey::new("shoe1", 42);

        let err = run_transaction(&store, &TakeOne(key.clone())).await.unwrap_err();
        assert!(err.is_contention());
        assert_eq!(store.qty(&key), Some(5));
        assert_eq!(store.transactions_started(), DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn test_store_slot_initializes_once() {
        let slot = StoreSlot::new();
        let calls = AtomicU32::new(0);
        let init = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Some(Arc::new(MemoryStockStore::new()) as Arc<dyn StockStore>)
        };

        let first = slot.get_or_init(init).unwrap();
        let second = slot
            .get_or_init(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                None
            })
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_store_slot_remembers_absence() {
        let slot = StoreSlot::new();
        assert!(slot.get_or_init(|| None).is_none());
        let again = slot.get_or_init(|| Some(Arc::new(MemoryStockStore::new()) as Arc<dyn StockStore>));
        assert!(again.is_none());
    }
}
