//! Cloud Firestore stock store over the REST API.
//!
//! Stock lives at `products/{productId}/stocks/{size}` with a numeric `qty`
//! field. Transactions use `beginTransaction` / `commit` / `rollback`; reads
//! attach the transaction ID so Firestore locks the documents they touch.
//!
//! # Connection
//!
//! [`initialize`] picks the first usable option:
//!
//! 1. `FIRESTORE_EMULATOR_HOST` - local emulator, no credentials
//! 2. `FIREBASE_SERVICE_ACCOUNT_{JSON,BASE64,PATH}` - service account key
//! 3. `GOOGLE_APPLICATION_CREDENTIALS` - application-default credentials
//!
//! If none is configured, or the configured one is broken, the relay runs
//! without a stock store.

pub mod auth;
pub mod credentials;
mod document;
mod transaction;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use checkout_relay_core::StockKey;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::instrument;
use url::Url;

pub use auth::{InvalidPrivateKey, TokenProvider};
pub use credentials::{CredentialError, CredentialSource};
pub use transaction::FirestoreTransaction;

use self::credentials::{
    ApplicationCredentials, load_application_credentials, load_service_account,
};
use self::document::error_from_response;
use crate::config::FirestoreConfig;
use crate::store::{StockStore, StockTransaction, StoreError};

/// Project used against the emulator when none is configured.
pub const EMULATOR_DEFAULT_PROJECT: &str = "demo-checkout-relay";

/// Request timeout for Firestore calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors connecting to Firestore at startup.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    PrivateKey(#[from] InvalidPrivateKey),

    #[error(
        "no Firestore project ID: set FIREBASE_PROJECT_ID or use a credential that names one"
    )]
    MissingProject,

    #[error("invalid Firestore endpoint {0}")]
    InvalidEndpoint(String),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Firestore-backed [`StockStore`].
///
/// Cheaply cloneable; clones share the HTTP client and token cache.
#[derive(Clone)]
pub struct FirestoreStore {
    inner: Arc<FirestoreStoreInner>,
}

struct FirestoreStoreInner {
    client: reqwest::Client,
    tokens: TokenProvider,
    /// `projects/{project}/databases/{database}`
    database_path: String,
    /// `{base}/v1/{database_path}/documents`
    documents_url: String,
}

#[derive(Deserialize)]
struct BeginTransactionResponse {
    transaction: String,
}

impl FirestoreStore {
    /// Create a store for one project database.
    ///
    /// # Errors
    ///
    /// Returns `InitError::InvalidEndpoint` if `api_base` is not an HTTP(S)
    /// URL that can carry a path.
    pub fn new(
        client: reqwest::Client,
        tokens: TokenProvider,
        api_base: &Url,
        project_id: &str,
        database_id: &str,
    ) -> Result<Self, InitError> {
        if api_base.cannot_be_a_base() || !matches!(api_base.scheme(), "http" | "https") {
            return Err(InitError::InvalidEndpoint(api_base.to_string()));
        }

        let database_path = format!("projects/{project_id}/databases/{database_id}");
        let documents_url = format!(
            "{}/v1/{database_path}/documents",
            api_base.as_str().trim_end_matches('/')
        );

        Ok(Self {
            inner: Arc::new(FirestoreStoreInner {
                client,
                tokens,
                database_path,
                documents_url,
            }),
        })
    }

    /// `projects/{project}/databases/{database}` this store writes to.
    #[must_use]
    pub fn database_path(&self) -> &str {
        &self.inner.database_path
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.inner.client
    }

    /// Fully qualified resource name of a stock document.
    pub(crate) fn document_name(&self, key: &StockKey) -> String {
        format!(
            "{}/documents/products/{}/stocks/{}",
            self.inner.database_path,
            key.product_id,
            key.size_document_id()
        )
    }

    /// URL for reading a stock document inside a transaction.
    pub(crate) fn document_url(&self, key: &StockKey, transaction: &str) -> Result<Url, StoreError> {
        if key.product_id.contains('/') {
            return Err(StoreError::InvalidKey(format!(
                "product ID {:?} contains '/'",
                key.product_id
            )));
        }

        let raw = format!(
            "{}/products/{}/stocks/{}",
            self.inner.documents_url,
            urlencoding::encode(&key.product_id),
            key.size_document_id()
        );
        let mut url = Url::parse(&raw).map_err(|e| StoreError::InvalidKey(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("transaction", transaction)
            .append_pair("mask.fieldPaths", document::QTY_FIELD);
        Ok(url)
    }

    /// URL of a `documents:{method}` RPC.
    pub(crate) fn method_url(&self, method: &str) -> String {
        format!("{}:{method}", self.inner.documents_url)
    }

    /// Attach a bearer token to a request.
    pub(crate) async fn authorized(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, StoreError> {
        let token = self.inner.tokens.access_token().await?;
        Ok(request.bearer_auth(token.expose_secret()))
    }
}

#[async_trait]
impl StockStore for FirestoreStore {
    fn name(&self) -> &'static str {
        "firestore"
    }

    #[instrument(skip(self, retry_of), fields(retry = retry_of.is_some()))]
    async fn begin(
        &self,
        retry_of: Option<String>,
    ) -> Result<Box<dyn StockTransaction>, StoreError> {
        let read_write = retry_of.map_or_else(
            || json!({}),
            |previous| json!({ "retryTransaction": previous }),
        );
        let body = json!({ "options": { "readWrite": read_write } });

        let request = self.http().post(self.method_url("beginTransaction")).json(&body);
        let response = self.authorized(request).await?.send().await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let begun: BeginTransactionResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(format!("invalid beginTransaction response: {e}")))?;

        Ok(Box::new(FirestoreTransaction::new(
            self.clone(),
            begun.transaction,
        )))
    }
}

// =============================================================================
// Initialization
// =============================================================================

/// Connect to Firestore if the configuration allows it.
///
/// Never fails: a missing or broken configuration is logged and yields
/// `None`, leaving the rest of the relay usable.
#[must_use]
pub fn initialize(config: &FirestoreConfig) -> Option<Arc<dyn StockStore>> {
    if !config.is_configured() {
        tracing::warn!("Firestore credentials not configured; /decrease-stock will return 503");
        return None;
    }

    match try_initialize(config) {
        Ok(Some(store)) => {
            tracing::info!(
                database = %store.database_path(),
                credential = store.inner.tokens.kind(),
                "Firestore stock store initialized"
            );
            Some(Arc::new(store))
        }
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to initialize Firestore; /decrease-stock will return 503");
            None
        }
    }
}

/// Build a Firestore store from configuration.
///
/// Returns `Ok(None)` when no connection option is configured.
///
/// # Errors
///
/// Returns `InitError` if a configured credential cannot be loaded or no
/// project ID can be determined.
pub fn try_initialize(config: &FirestoreConfig) -> Result<Option<FirestoreStore>, InitError> {
    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

    if let Some(host) = &config.emulator_host {
        let base = Url::parse(&format!("http://{}", host.trim()))
            .map_err(|_| InitError::InvalidEndpoint(host.clone()))?;
        let project = config
            .project_id
            .as_deref()
            .unwrap_or(EMULATOR_DEFAULT_PROJECT);
        let tokens = TokenProvider::emulator(client.clone());
        return FirestoreStore::new(client, tokens, &base, project, &config.database_id).map(Some);
    }

    if let Some(key) = load_service_account(config.credential_source.as_ref())? {
        let project = config
            .project_id
            .clone()
            .or_else(|| key.project_id.clone())
            .ok_or(InitError::MissingProject)?;
        let tokens = TokenProvider::service_account(client.clone(), key)?;
        return FirestoreStore::new(client, tokens, &config.api_base, &project, &config.database_id)
            .map(Some);
    }

    if let Some(path) = &config.application_credentials {
        let credentials = load_application_credentials(path)?;
        let project = config
            .project_id
            .clone()
            .or_else(|| credentials.project_id().map(ToString::to_string))
            .ok_or(InitError::MissingProject)?;
        let tokens = match credentials {
            ApplicationCredentials::ServiceAccount(key) => {
                TokenProvider::service_account(client.clone(), key)?
            }
            ApplicationCredentials::AuthorizedUser(user) => {
                TokenProvider::authorized_user(client.clone(), user)
            }
        };
        return FirestoreStore::new(client, tokens, &config.api_base, &project, &config.database_id)
            .map(Some);
    }

    Ok(None)
}
