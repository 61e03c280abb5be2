//! End-to-end tests for `POST /payment-intent` against a mock Stripe.

use checkout_relay_integration_tests::{TEST_STRIPE_KEY, TestContext};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

// =============================================================================
// Success Path
// =============================================================================

#[tokio::test]
async fn test_creates_intent_and_relays_secret() {
    let ctx = TestContext::start(None).await;
    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .and(header("authorization", format!("Bearer {TEST_STRIPE_KEY}").as_str()))
        .and(body_string_contains("amount=4200"))
        .and(body_string_contains("currency=rsd"))
        .and(body_string_contains("receipt_email=ana%40example.com"))
        .and(body_string_contains("metadata%5BcustomerName%5D=Ana+Markovic"))
        .and(body_string_contains("automatic_payment_methods%5Benabled%5D=true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_3Mtw",
            "object": "payment_intent",
            "client_secret": "pi_3Mtw_secret_YrKJ",
            "status": "requires_payment_method"
        })))
        .expect(1)
        .mount(&ctx.stripe)
        .await;

    let (status, body) = ctx
        .post_json(
            "/payment-intent",
            &json!({
                "amount": 4200,
                "currency": "RSD",
                "customerEmail": "ana@example.com",
                "customerName": "Ana Markovic"
            }),
        )
        .await;

    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!({"clientSecret": "pi_3Mtw_secret_YrKJ", "paymentIntentId": "pi_3Mtw"})
    );
}

#[tokio::test]
async fn test_each_request_gets_its_own_idempotency_key() {
    let ctx = TestContext::start(None).await;
    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_1",
            "client_secret": "pi_1_secret"
        })))
        .expect(2)
        .mount(&ctx.stripe)
        .await;

    let body = json!({"amount": 100, "currency": "usd"});
    ctx.post_json("/payment-intent", &body).await;
    ctx.post_json("/payment-intent", &body).await;

    let requests = ctx.stripe.received_requests().await.unwrap_or_default();
    let keys: Vec<_> = requests
        .iter()
        .filter_map(|r| r.headers.get("idempotency-key"))
        .collect();
    assert_eq!(keys.len(), 2);
    assert_ne!(keys[0], keys[1]);
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_invalid_input_never_calls_stripe() {
    let ctx = TestContext::start(None).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&ctx.stripe)
        .await;

    let cases = [
        (json!({"amount": 0, "currency": "usd"}), "Invalid amount. Must be integer > 0."),
        (json!({"amount": -1, "currency": "usd"}), "Invalid amount. Must be integer > 0."),
        (json!({"amount": 9.99, "currency": "usd"}), "Invalid amount. Must be integer > 0."),
        (json!({"currency": "usd"}), "Invalid amount. Must be integer > 0."),
        (json!({"amount": 100}), "Invalid currency."),
        (json!({"amount": 100, "currency": ""}), "Invalid currency."),
    ];

    for (body, expected) in cases {
        let (status, response) = ctx.post_json("/payment-intent", &body).await;
        assert_eq!(status, 400, "body {body}");
        assert_eq!(response["error"], expected, "body {body}");
    }
}

// =============================================================================
// Provider Failures
// =============================================================================

#[tokio::test]
async fn test_stripe_error_message_is_relayed() {
    let ctx = TestContext::start(None).await;
    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "type": "invalid_request_error",
                "param": "currency",
                "message": "Invalid currency: zzz. Stripe currently supports these currencies: usd, eur, ..."
            }
        })))
        .mount(&ctx.stripe)
        .await;

    let (status, body) = ctx
        .post_json("/payment-intent", &json!({"amount": 100, "currency": "zzz"}))
        .await;

    assert_eq!(status, 500);
    assert!(body["error"].as_str().unwrap_or_default().starts_with("Invalid currency: zzz."));
}

#[tokio::test]
async fn test_stripe_error_without_message_uses_fallback() {
    let ctx = TestContext::start(None).await;
    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&ctx.stripe)
        .await;

    let (status, body) = ctx
        .post_json("/payment-intent", &json!({"amount": 100, "currency": "usd"}))
        .await;

    assert_eq!(status, 500);
    assert_eq!(body["error"], "Stripe payment-intent creation failed.");
}

#[tokio::test]
async fn test_health() {
    let ctx = TestContext::start(None).await;
    let response = ctx
        .client
        .get(format!("{}/health", ctx.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert!(response.headers().contains_key("x-request-id"));
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({"ok": true}));
}
