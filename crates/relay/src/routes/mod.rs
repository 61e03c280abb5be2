//! HTTP route handlers for the relay.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health          - Liveness check
//! POST /payment-intent  - Create a Stripe payment intent
//! POST /decrease-stock  - Decrement stock for a paid cart
//! ```
//!
//! Request bodies are read as raw bytes and validated by hand so that every
//! failure maps to the field-specific messages in
//! [`crate::services::validation`].

pub mod health;
pub mod payment;
pub mod stock;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Create all routes for the relay.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/payment-intent", post(payment::create_payment_intent))
        .route("/decrease-stock", post(stock::decrease_stock))
}

/// Build the application router with its middleware stack.
///
/// Sentry layers are added by the binary, outside this stack.
pub fn router(state: AppState) -> Router {
    routes()
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use checkout_relay_core::{PaymentIntent, PaymentIntentRequest, StockKey};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::store::MemoryStockStore;
    use crate::stripe::{PaymentProvider, StripeError};

    /// Records requests and answers with a canned intent or error.
    #[derive(Default)]
    struct RecordingPayments {
        requests: Mutex<Vec<PaymentIntentRequest>>,
        decline: Option<&'static str>,
    }

    #[async_trait]
    impl PaymentProvider for RecordingPayments {
        async fn create_payment_intent(
            &self,
            request: &PaymentIntentRequest,
        ) -> Result<PaymentIntent, StripeError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(message) = self.decline {
                return Err(StripeError::Api {
                    status: 402,
                    message: Some(message.to_string()),
                    kind: Some("card_error".to_string()),
                });
            }
            Ok(PaymentIntent {
                id: "pi_test".to_string(),
                client_secret: "pi_test_secret".to_string(),
            })
        }
    }

    fn app(payments: Arc<RecordingPayments>, store: Option<MemoryStockStore>) -> Router {
        let store = store.map(|s| Arc::new(s) as Arc<dyn crate::store::StockStore>);
        router(AppState::new(payments, store))
    }

    async fn send(app: Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(Arc::default(), None);
        let (status, body) = send(app, "GET", "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_payment_intent_forwards_lowercased_currency() {
        let payments = Arc::new(RecordingPayments::default());
        let (status, body) = send(
            app(payments.clone(), None),
            "POST",
            "/payment-intent",
            r#"{"amount": 2500, "currency": "EUR", "customerEmail": "ana@example.com"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"clientSecret": "pi_test_secret", "paymentIntentId": "pi_test"})
        );

        let requests = payments.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].amount.minor_units(), 2500);
        assert_eq!(requests[0].currency.as_str(), "eur");
        assert_eq!(requests[0].receipt_email(), Some("ana@example.com"));
    }

    #[tokio::test]
    async fn test_invalid_amount_never_reaches_provider() {
        let payments = Arc::new(RecordingPayments::default());
        for amount in ["0", "-100", "12.5", "\"100\""] {
            let (status, body) = send(
                app(payments.clone(), None),
                "POST",
                "/payment-intent",
                &format!(r#"{{"amount": {amount}, "currency": "usd"}}"#),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "Invalid amount. Must be integer > 0.");
        }
        assert!(payments.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_body_is_invalid_amount() {
        let (status, body) = send(app(Arc::default(), None), "POST", "/payment-intent", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid amount. Must be integer > 0.");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (status, body) =
            send(app(Arc::default(), None), "POST", "/payment-intent", "{amount:").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid JSON body.");
    }

    #[tokio::test]
    async fn test_provider_failure_relays_message() {
        let payments = Arc::new(RecordingPayments {
            decline: Some("Your card was declined."),
            ..Default::default()
        });
        let (status, body) = send(
            app(payments, None),
            "POST",
            "/payment-intent",
            r#"{"amount": 100, "currency": "usd"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Your card was declined.");
    }

    #[tokio::test]
    async fn test_decrease_stock_without_store_is_unavailable() {
        let (status, body) = send(
            app(Arc::default(), None),
            "POST",
            "/decrease-stock",
            r#"{"items": [{"productId": "shoe1", "size": 42, "quantity": 1}]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("FIREBASE_SERVICE_ACCOUNT_PATH"));
    }

    #[tokio::test]
    async fn test_decrease_stock_success() {
        let store = MemoryStockStore::new().with_stock("shoe1", 42, 5);
        let (status, body) = send(
            app(Arc::default(), Some(store.clone())),
            "POST",
            "/decrease-stock",
            r#"{"items": [{"productId": "shoe1", "size": 42, "quantity": 2, "title": "Runner"}]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true, "updated": 1}));
        assert_eq!(store.qty(&StockKey::new("shoe1", 42)), Some(3));
    }

    #[tokio::test]
    async fn test_decrease_stock_insufficient() {
        let store = MemoryStockStore::new().with_stock("shoe1", 42, 5);
        let (status, body) = send(
            app(Arc::default(), Some(store.clone())),
            "POST",
            "/decrease-stock",
            r#"{"items": [{"productId": "shoe1", "size": 42, "quantity": 10}]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("shoe1"));
        assert!(message.contains("Available: 5"));
        assert_eq!(store.qty(&StockKey::new("shoe1", 42)), Some(5));
    }

    #[tokio::test]
    async fn test_decrease_stock_payload_errors() {
        let store = MemoryStockStore::new().with_stock("shoe1", 42, 5);

        let (status, body) = send(
            app(Arc::default(), Some(store.clone())),
            "POST",
            "/decrease-stock",
            r#"{"items": []}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid items payload.");

        let (status, body) = send(
            app(Arc::default(), Some(store.clone())),
            "POST",
            "/decrease-stock",
            r#"{"items": [{"productId": "shoe1", "size": 42, "quantity": 1}, {"productId": "shoe1", "size": "x", "quantity": 1}]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid product size/quantity.");
        assert_eq!(store.qty(&StockKey::new("shoe1", 42)), Some(5));
    }

    #[tokio::test]
    async fn test_decrease_stock_only_reserved_items() {
        let store = MemoryStockStore::new();
        let (status, body) = send(
            app(Arc::default(), Some(store.clone())),
            "POST",
            "/decrease-stock",
            r#"{"items": [{"productId": "assets/gift-wrap", "size": "n/a", "quantity": 0}]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true, "updated": 0}));
        assert_eq!(store.transactions_started(), 0);
    }

    #[tokio::test]
    async fn test_cors_preflight_is_allowed() {
        let response = app(Arc::default(), None)
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/payment-intent")
                    .header("origin", "https://shop.example.com")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert!(response.headers().contains_key("access-control-allow-origin"));
    }
}
