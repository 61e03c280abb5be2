//! In-process stock store.
//!
//! Uses optimistic concurrency: every record carries a version, reads remember
//! the version they saw, and commit fails with [`StoreError::Contention`] if
//! any of them changed in the meantime. Conflicts can also be injected to
//! exercise retry paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use checkout_relay_core::{StockKey, StockRecord};

use super::{StockStore, StockTransaction, StoreError};

#[derive(Debug, Clone, Copy)]
struct Versioned {
    qty: i64,
    version: u64,
}

#[derive(Default)]
struct Shared {
    records: Mutex<HashMap<StockKey, Versioned>>,
    injected_conflicts: AtomicU32,
    transactions_started: AtomicU32,
    commits: AtomicU32,
}

impl Shared {
    fn records(&self) -> MutexGuard<'_, HashMap<StockKey, Versioned>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Stock store held in memory.
///
/// Cheaply cloneable; clones share the same records.
#[derive(Clone, Default)]
pub struct MemoryStockStore {
    shared: Arc<Shared>,
}

impl MemoryStockStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stock record.
    #[must_use]
    pub fn with_stock(self, product_id: &str, size: i64, qty: i64) -> Self {
        self.set_qty(&StockKey::new(product_id, size), qty);
        self
    }

    /// Make the next `count` commits fail with contention.
    #[must_use]
    pub fn with_conflicts(self, count: u32) -> Self {
        self.shared
            .injected_conflicts
            .store(count, Ordering::SeqCst);
        self
    }

    /// Overwrite a record's quantity outside any transaction.
    pub fn set_qty(&self, key: &StockKey, qty: i64) {
        let mut records = self.shared.records();
        let version = records.get(key).map_or(0, |r| r.version + 1);
        records.insert(key.clone(), Versioned { qty, version });
    }

    /// Current quantity of a record, if it exists.
    #[must_use]
    pub fn qty(&self, key: &StockKey) -> Option<i64> {
        self.shared.records().get(key).map(|r| r.qty)
    }

    /// Number of transactions opened so far.
    #[must_use]
    pub fn transactions_started(&self) -> u32 {
        self.shared.transactions_started.load(Ordering::SeqCst)
    }

    /// Number of successful commits so far.
    #[must_use]
    pub fn commits(&self) -> u32 {
        self.shared.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StockStore for MemoryStockStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(
        &self,
        _retry_of: Option<String>,
    ) -> Result<Box<dyn StockTransaction>, StoreError> {
        self.shared
            .transactions_started
            .fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.shared),
            reads: HashMap::new(),
            writes: Vec::new(),
        }))
    }
}

struct MemoryTransaction {
    shared: Arc<Shared>,
    /// Version observed per key; `None` if the record did not exist.
    reads: HashMap<StockKey, Option<u64>>,
    writes: Vec<(StockKey, StockRecord)>,
}

#[async_trait]
impl StockTransaction for MemoryTransaction {
    async fn read(&mut self, key: &StockKey) -> Result<Option<StockRecord>, StoreError> {
        let current = self.shared.records().get(key).copied();
        self.reads
            .entry(key.clone())
            .or_insert_with(|| current.map(|r| r.version));
        Ok(current.map(|r| StockRecord::new(r.qty)))
    }

    fn stage_write(&mut self, key: &StockKey, record: StockRecord) {
        self.writes.push((key.clone(), record));
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let injected = self
            .shared
            .injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Contention("injected conflict".to_string()));
        }

        let mut records = self.shared.records();

        for (key, seen) in &self.reads {
            if records.get(key).map(|r| r.version) != *seen {
                return Err(StoreError::Contention(format!(
                    "{key} changed during transaction"
                )));
            }
        }

        for (key, record) in self.writes.drain(..) {
            let version = records.get(&key).map_or(0, |r| r.version + 1);
            records.insert(
                key,
                Versioned {
                    qty: record.qty,
                    version,
                },
            );
        }

        drop(records);
        self.shared.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.writes.clear();
        Ok(())
    }
}
