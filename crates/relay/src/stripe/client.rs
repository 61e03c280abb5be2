//! Stripe REST client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use checkout_relay_core::{PaymentIntent, PaymentIntentRequest};
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;
use uuid::Uuid;

use super::{ErrorBody, PaymentProvider, StripeError};
use crate::config::StripeConfig;

/// Stripe's own client libraries time out after 80 seconds.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(80);

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    secret_key: SecretString,
    payment_intents_url: String,
}

impl StripeClient {
    /// Create a new Stripe API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            inner: Arc::new(StripeClientInner {
                client,
                secret_key: config.secret_key.clone(),
                payment_intents_url: format!(
                    "{}/v1/payment_intents",
                    config.api_base.as_str().trim_end_matches('/')
                ),
            }),
        })
    }

    /// Parse error response from the Stripe API.
    async fn parse_error(response: reqwest::Response) -> StripeError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();

        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => StripeError::Api {
                status,
                message: body.error.message,
                kind: body.error.kind,
            },
            Err(_) => StripeError::Api {
                status,
                message: None,
                kind: None,
            },
        }
    }
}

/// Form fields for `POST /v1/payment_intents`.
fn payment_intent_form(request: &PaymentIntentRequest) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("amount", request.amount.to_string()),
        ("currency", request.currency.to_string()),
    ];
    if let Some(email) = request.receipt_email() {
        form.push(("receipt_email", email.to_string()));
    }
    form.push((
        "metadata[customerName]",
        request.metadata_customer_name().to_string(),
    ));
    form.push(("automatic_payment_methods[enabled]", "true".to_string()));
    form
}

#[async_trait]
impl PaymentProvider for StripeClient {
    #[instrument(
        skip(self, request),
        fields(amount = %request.amount, currency = %request.currency)
    )]
    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, StripeError> {
        let response = self
            .inner
            .client
            .post(&self.inner.payment_intents_url)
            .bearer_auth(self.inner.secret_key.expose_secret())
            .header("Idempotency-Key", Uuid::new_v4().to_string())
            .form(&payment_intent_form(request))
            .send()
            .await?;

        if !response.status().is_success() {
            let err = Self::parse_error(response).await;
            tracing::warn!(error = %err, "Stripe rejected payment intent");
            return Err(err);
        }

        let intent: PaymentIntent = response
            .json()
            .await
            .map_err(|e| StripeError::Parse(format!("Failed to parse response: {e}")))?;

        tracing::info!(payment_intent_id = %intent.id, "Payment intent created");
        Ok(intent)
    }
}
