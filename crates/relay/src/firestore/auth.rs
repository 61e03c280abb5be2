//! OAuth2 access tokens for the Firestore REST API.
//!
//! - Service accounts sign an RS256 JWT assertion and exchange it at the
//!   key's `token_uri` (two-legged OAuth).
//! - Authorized-user credentials (`gcloud auth application-default login`)
//!   exchange their refresh token.
//! - The emulator accepts the fixed `owner` token.
//!
//! Tokens are cached in memory and refreshed shortly before they expire.

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::instrument;

use super::credentials::{AuthorizedUser, DEFAULT_TOKEN_URI, ServiceAccountKey};
use crate::store::StoreError;

/// OAuth scope granting Firestore access.
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Token the Firestore emulator accepts as an admin credential.
const EMULATOR_TOKEN: &str = "owner";

/// Lifetime requested for signed assertions, in seconds.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens are refreshed this many seconds before they expire.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Errors building a token provider.
#[derive(Debug, thiserror::Error)]
#[error("invalid service account private key: {0}")]
pub struct InvalidPrivateKey(#[from] jsonwebtoken::errors::Error);

/// A cached access token.
#[derive(Debug, Clone)]
struct AccessToken {
    token: SecretString,
    /// Unix timestamp when the token expires.
    expires_at: i64,
}

impl AccessToken {
    fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() >= self.expires_at - EXPIRY_SKEW_SECS
    }
}

enum TokenSource {
    ServiceAccount {
        key: ServiceAccountKey,
        signing_key: EncodingKey,
    },
    AuthorizedUser(AuthorizedUser),
    Emulator,
}

/// JWT claims for the service account assertion.
#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Response from the token endpoint.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Token lifetime in seconds.
    expires_in: i64,
}

/// Error response from the token endpoint.
#[derive(Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Supplies bearer tokens for Firestore requests.
pub struct TokenProvider {
    client: reqwest::Client,
    source: TokenSource,
    token_uri: String,
    cached: RwLock<Option<AccessToken>>,
}

impl TokenProvider {
    /// Provider signing assertions with a service account key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrivateKey` if the key is not a usable RSA PEM key.
    pub fn service_account(
        client: reqwest::Client,
        key: ServiceAccountKey,
    ) -> Result<Self, InvalidPrivateKey> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())?;
        let token_uri = key.token_uri.clone();

        Ok(Self {
            client,
            source: TokenSource::ServiceAccount { key, signing_key },
            token_uri,
            cached: RwLock::new(None),
        })
    }

    /// Provider exchanging an authorized user's refresh token.
    #[must_use]
    pub fn authorized_user(client: reqwest::Client, user: AuthorizedUser) -> Self {
        Self {
            client,
            source: TokenSource::AuthorizedUser(user),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            cached: RwLock::new(None),
        }
    }

    /// Provider for the Firestore emulator.
    #[must_use]
    pub fn emulator(client: reqwest::Client) -> Self {
        Self {
            client,
            source: TokenSource::Emulator,
            token_uri: String::new(),
            cached: RwLock::new(None),
        }
    }

    /// Override the token endpoint.
    #[must_use]
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    /// Short description of the credential kind, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self.source {
            TokenSource::ServiceAccount { .. } => "service_account",
            TokenSource::AuthorizedUser(_) => "authorized_user",
            TokenSource::Emulator => "emulator",
        }
    }

    /// Get a valid access token, fetching a new one if needed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Auth` if the token endpoint rejects the request,
    /// or `StoreError::Http` if it cannot be reached.
    pub async fn access_token(&self) -> Result<SecretString, StoreError> {
        if matches!(self.source, TokenSource::Emulator) {
            return Ok(SecretString::from(EMULATOR_TOKEN));
        }

        if let Some(token) = self.cached.read().await.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.token.clone());
        }

        let mut cached = self.cached.write().await;
        // Another request may have refreshed while we waited for the lock
        if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.token.clone());
        }

        let fresh = self.fetch_token().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    #[instrument(skip(self), fields(kind = self.kind()))]
    async fn fetch_token(&self) -> Result<AccessToken, StoreError> {
        let now = chrono::Utc::now().timestamp();

        let form: Vec<(&str, String)> = match &self.source {
            TokenSource::ServiceAccount { key, signing_key } => {
                let assertion = sign_assertion(key, signing_key, &self.token_uri, now)?;
                vec![
                    (
                        "grant_type",
                        "urn:ietf:params:oauth:grant-type:jwt-bearer".to_string(),
                    ),
                    ("assertion", assertion),
                ]
            }
            TokenSource::AuthorizedUser(user) => vec![
                ("grant_type", "refresh_token".to_string()),
                ("client_id", user.client_id.clone()),
                (
                    "client_secret",
                    user.client_secret.expose_secret().to_string(),
                ),
                (
                    "refresh_token",
                    user.refresh_token.expose_secret().to_string(),
                ),
            ],
            TokenSource::Emulator => {
                return Ok(AccessToken {
                    token: SecretString::from(EMULATOR_TOKEN),
                    expires_at: i64::MAX,
                });
            }
        };

        let response = self.client.post(&self.token_uri).form(&form).send().await?;
        let status = response.status();

        if status.is_success() {
            let body: TokenResponse = response
                .json()
                .await
                .map_err(|e| StoreError::Auth(format!("invalid token response: {e}")))?;
            tracing::debug!(expires_in = body.expires_in, "Obtained Firestore access token");

            return Ok(AccessToken {
                token: SecretString::from(body.access_token),
                expires_at: now + body.expires_in,
            });
        }

        let error: TokenErrorResponse =
            response.json().await.unwrap_or(TokenErrorResponse {
                error: None,
                error_description: None,
            });
        let message = error
            .error_description
            .or(error.error)
            .unwrap_or_else(|| "token request rejected".to_string());

        Err(StoreError::Auth(format!("HTTP {status}: {message}")))
    }
}

/// Sign the JWT assertion exchanged for an access token.
fn sign_assertion(
    key: &ServiceAccountKey,
    signing_key: &EncodingKey,
    audience: &str,
    now: i64,
) -> Result<String, StoreError> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid.clone_from(&key.private_key_id);

    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: DATASTORE_SCOPE,
        aud: audience,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };

    jsonwebtoken::encode(&header, &claims, signing_key)
        .map_err(|e| StoreError::Auth(format!("failed to sign assertion: {e}")))
}
