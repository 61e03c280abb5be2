//! Integration tests for the checkout relay.
//!
//! Each test boots the real router on an ephemeral local port and talks to it
//! over HTTP. Stripe is replaced by a `wiremock` server; stock lives in a
//! [`MemoryStockStore`] or in a `wiremock` server speaking the Firestore REST
//! protocol.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p checkout-relay-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;

use checkout_relay::AppState;
use checkout_relay::config::StripeConfig;
use checkout_relay::store::{MemoryStockStore, StockStore};
use checkout_relay::stripe::StripeClient;
use secrecy::SecretString;
use url::Url;
use wiremock::MockServer;

/// Secret key the relay sends to the mock Stripe server.
pub const TEST_STRIPE_KEY: &str = "sk_test_4eC39HqLyjWDarjtT1zdp7dc";

/// A running relay plus its fake upstreams.
pub struct TestContext {
    pub client: reqwest::Client,
    pub base_url: String,
    pub stripe: MockServer,
}

impl TestContext {
    /// Start a relay whose stock store is `store` (or none).
    ///
    /// # Panics
    ///
    /// Panics if the relay cannot be started.
    pub async fn start(store: Option<Arc<dyn StockStore>>) -> Self {
        let stripe = MockServer::start().await;
        let stripe_config = StripeConfig {
            secret_key: SecretString::from(TEST_STRIPE_KEY),
            api_base: Url::parse(&stripe.uri()).expect("mock server URI is a URL"),
        };
        let payments = Arc::new(StripeClient::new(&stripe_config).expect("Stripe client builds"));

        let addr = spawn_relay(AppState::new(payments, store)).await;

        Self {
            client: reqwest::Client::new(),
            base_url: format!("http://{addr}"),
            stripe,
        }
    }

    /// Start a relay backed by an in-memory store.
    pub async fn with_memory_store(store: &MemoryStockStore) -> Self {
        Self::start(Some(Arc::new(store.clone()))).await
    }

    /// POST a JSON body and return the status and parsed JSON response.
    ///
    /// # Panics
    ///
    /// Panics if the request fails or the response is not JSON.
    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> (u16, serde_json::Value) {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .expect("request reaches relay");
        let status = response.status().as_u16();
        let json = response.json().await.expect("relay answers with JSON");
        (status, json)
    }
}

/// Serve the relay router on an ephemeral port in the background.
///
/// # Panics
///
/// Panics if no local port can be bound.
pub async fn spawn_relay(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("listener has an address");

    tokio::spawn(async move {
        axum::serve(listener, checkout_relay::router(state))
            .await
            .expect("relay serves");
    });

    addr
}
