//! Stock decrements after checkout.

use axum::{Json, body::Bytes, extract::State};
use checkout_relay_core::AggregatedStock;
use serde::Serialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::services::inventory;
use crate::services::validation::{parse_body, validate_stock_request};
use crate::state::AppState;

/// Response for a successful decrement.
#[derive(Debug, Serialize)]
pub struct DecreaseStockResponse {
    pub ok: bool,
    /// Number of distinct product/size records decremented.
    pub updated: usize,
}

/// Decrement stock for `{items: [{productId, size, quantity, title?}]}`.
///
/// Returns 503 while no stock store is configured.
#[instrument(skip_all)]
pub async fn decrease_stock(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DecreaseStockResponse>> {
    let body = parse_body(&body)?;
    let store = state.stock_store().ok_or(AppError::StoreUnavailable)?;

    let lines = validate_stock_request(&body)?;
    let stock: AggregatedStock = lines.into_iter().collect();

    let updated = inventory::decrease_stock(store, &stock).await?;

    Ok(Json(DecreaseStockResponse { ok: true, updated }))
}
