//! Payment intent creation.

use axum::{Json, body::Bytes, extract::State};
use serde::Serialize;
use tracing::instrument;

use crate::error::Result;
use crate::services::validation::{parse_body, validate_payment_request};
use crate::state::AppState;

/// Response for a created payment intent.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
}

/// Create a payment intent for `{amount, currency, customerEmail?, customerName?}`.
///
/// The body is fully validated before the provider is called.
#[instrument(skip_all)]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PaymentIntentResponse>> {
    let body = parse_body(&body)?;
    let request = validate_payment_request(&body)?;

    let intent = state.payments().create_payment_intent(&request).await?;

    Ok(Json(PaymentIntentResponse {
        client_secret: intent.client_secret,
        payment_intent_id: intent.id,
    }))
}
