//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors are rendered as
//! `{"error": "<message>"}`; server-side failures are logged and captured to
//! Sentry before responding.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::{TransactionError, ValidationError};
use crate::stripe::StripeError;

/// Message returned when no stock store is configured.
pub const STORE_UNAVAILABLE_MESSAGE: &str = "Firestore is not configured on the relay. Set \
     FIREBASE_SERVICE_ACCOUNT_JSON, FIREBASE_SERVICE_ACCOUNT_BASE64, \
     FIREBASE_SERVICE_ACCOUNT_PATH or GOOGLE_APPLICATION_CREDENTIALS.";

/// Message returned when the store fails for reasons other than stock levels.
pub const STOCK_FAILURE_MESSAGE: &str = "Stock decrement failed.";

/// Application-level error type for the relay.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(#[from] ValidationError),

    /// No stock store is configured.
    #[error("Stock store unavailable")]
    StoreUnavailable,

    /// Stock decrement refused or failed.
    #[error("Stock error: {0}")]
    Stock(#[from] TransactionError),

    /// Payment provider rejected the request or could not be reached.
    #[error("Payment error: {0}")]
    Payment(#[from] StripeError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Stock(_) | Self::Payment(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the client.
    ///
    /// Stock conflicts and provider messages are passed through; store and
    /// internal failures are not.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::BadRequest(err) => err.to_string(),
            Self::StoreUnavailable => STORE_UNAVAILABLE_MESSAGE.to_string(),
            Self::Stock(err) if err.is_domain() => err.to_string(),
            Self::Stock(_) => STOCK_FAILURE_MESSAGE.to_string(),
            Self::Payment(err) => err.provider_message().to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            // Insufficient stock is an expected outcome, not a fault
            Self::Stock(err) if err.is_domain() => {
                tracing::info!(error = %self, "Stock decrement refused");
            }
            Self::Stock(_) | Self::Payment(_) | Self::Internal(_) => {
                let event_id = sentry::capture_error(&self);
                tracing::error!(
                    error = %self,
                    sentry_event_id = %event_id,
                    "Request error"
                );
            }
            Self::BadRequest(_) | Self::StoreUnavailable => {}
        }

        let body = Json(json!({ "error": self.client_message() }));
        (self.status(), body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
