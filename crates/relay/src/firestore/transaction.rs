//! A read-write Firestore transaction.
//!
//! Reads go straight to the server with the transaction ID attached (which
//! takes the document locks). Writes are buffered and sent in a single
//! `commit` call, so either all of them land or none do.

use async_trait::async_trait;
use checkout_relay_core::{StockKey, StockRecord};
use serde_json::{Value, json};
use tracing::instrument;

use super::FirestoreStore;
use super::document::{Document, error_from_response, qty_update};
use crate::store::{StockTransaction, StoreError};

pub struct FirestoreTransaction {
    store: FirestoreStore,
    id: String,
    writes: Vec<Value>,
    finished: bool,
}

impl FirestoreTransaction {
    pub(super) const fn new(store: FirestoreStore, id: String) -> Self {
        Self {
            store,
            id,
            writes: Vec::new(),
            finished: false,
        }
    }
}

#[async_trait]
impl StockTransaction for FirestoreTransaction {
    #[instrument(skip(self), fields(key = %key))]
    async fn read(&mut self, key: &StockKey) -> Result<Option<StockRecord>, StoreError> {
        let url = self.store.document_url(key, &self.id)?;
        let response = self.store.authorized(self.store.http().get(url)).await?.send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let document: Document = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(format!("invalid document: {e}")))?;

        Ok(Some(StockRecord::new(document.qty()?)))
    }

    fn stage_write(&mut self, key: &StockKey, record: StockRecord) {
        self.writes
            .push(qty_update(&self.store.document_name(key), record.qty));
    }

    #[instrument(skip(self), fields(writes = self.writes.len()))]
    async fn commit(&mut self) -> Result<(), StoreError> {
        let body = json!({
            "writes": self.writes,
            "transaction": self.id,
        });

        let request = self.store.http().post(self.store.method_url("commit")).json(&body);
        let response = self.store.authorized(request).await?.send().await?;
        // A failed commit ends the transaction server-side as well
        self.finished = true;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        self.writes.clear();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.writes.clear();
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let request = self
            .store
            .http()
            .post(self.store.method_url("rollback"))
            .json(&json!({ "transaction": self.id }));
        let response = self.store.authorized(request).await?.send().await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    fn retry_token(&self) -> Option<String> {
        Some(self.id.clone())
    }
}
