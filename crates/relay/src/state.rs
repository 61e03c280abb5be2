//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::firestore;
use crate::store::{StockStore, StoreSlot};
use crate::stripe::{PaymentProvider, StripeClient, StripeError};

/// Process-wide stock store slot, filled on first use.
static STOCK_STORE: StoreSlot = StoreSlot::new();

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and hands every handler the
/// payment provider and (if configured) the stock store.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    payments: Arc<dyn PaymentProvider>,
    stock_store: Option<Arc<dyn StockStore>>,
}

impl AppState {
    /// Create a state from already-built collaborators.
    #[must_use]
    pub fn new(
        payments: Arc<dyn PaymentProvider>,
        stock_store: Option<Arc<dyn StockStore>>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                payments,
                stock_store,
            }),
        }
    }

    /// Build the production state: a Stripe client and the Firestore store.
    ///
    /// The store is resolved through a process-wide slot, so building state
    /// twice reuses the first connection (or the first absence of one).
    ///
    /// # Errors
    ///
    /// Returns an error if the Stripe HTTP client cannot be built.
    pub fn from_config(config: &RelayConfig) -> Result<Self, StripeError> {
        let payments = Arc::new(StripeClient::new(&config.stripe)?);
        let stock_store = STOCK_STORE.get_or_init(|| firestore::initialize(&config.firestore));
        Ok(Self::new(payments, stock_store))
    }

    /// Get the payment provider.
    #[must_use]
    pub fn payments(&self) -> &dyn PaymentProvider {
        self.inner.payments.as_ref()
    }

    /// Get the stock store, if one is configured.
    #[must_use]
    pub fn stock_store(&self) -> Option<&dyn StockStore> {
        self.inner.stock_store.as_deref()
    }
}
