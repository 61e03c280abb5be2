//! Stripe payment intents.
//!
//! # API Reference
//!
//! - Base URL: `https://api.stripe.com` (overridable via `STRIPE_API_BASE`)
//! - Authentication: secret key as bearer token
//! - Requests: `application/x-www-form-urlencoded`, nested fields as `a[b]`
//! - Every create call carries a fresh `Idempotency-Key`

mod client;

pub use client::StripeClient;

use async_trait::async_trait;
use checkout_relay_core::{PaymentIntent, PaymentIntentRequest};
use serde::Deserialize;
use thiserror::Error;

/// Message relayed when Stripe gives no usable error message.
pub const FALLBACK_MESSAGE: &str = "Stripe payment-intent creation failed.";

/// Errors that can occur when interacting with the Stripe API.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {}", message.as_deref().unwrap_or("(no message)"))]
    Api {
        status: u16,
        /// Stripe's human-readable message, when it sent one.
        message: Option<String>,
        /// Stripe error type, e.g. `invalid_request_error` or `card_error`.
        kind: Option<String>,
    },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl StripeError {
    /// The message to show the caller: Stripe's own, or a generic fallback.
    #[must_use]
    pub fn provider_message(&self) -> &str {
        match self {
            Self::Api {
                message: Some(message),
                ..
            } if !message.is_empty() => message,
            _ => FALLBACK_MESSAGE,
        }
    }
}

/// Stripe error envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Creates payment intents with an external processor.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a payment intent and return its ID and client secret.
    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, StripeError>;
}
