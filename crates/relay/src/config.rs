//! Relay configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STRIPE_SECRET_KEY` - Stripe secret API key
//!
//! ## Optional
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8787)
//! - `STRIPE_API_BASE` - Stripe API base URL (default: <https://api.stripe.com>)
//! - `FIREBASE_SERVICE_ACCOUNT_JSON` - Service account key as inline JSON
//! - `FIREBASE_SERVICE_ACCOUNT_BASE64` - Service account key as base64-encoded JSON
//! - `FIREBASE_SERVICE_ACCOUNT_PATH` - Path to a service account key file
//! - `GOOGLE_APPLICATION_CREDENTIALS` - Application-default credentials file
//! - `FIREBASE_PROJECT_ID` / `GOOGLE_CLOUD_PROJECT` - Project override
//! - `FIRESTORE_DATABASE_ID` - Database ID (default: `(default)`)
//! - `FIRESTORE_API_BASE` - Firestore REST base URL (default: <https://firestore.googleapis.com>)
//! - `FIRESTORE_EMULATOR_HOST` - `host:port` of a local Firestore emulator
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `LOG_FORMAT` - `json` for structured log lines, anything else for text
//!
//! Store credentials are all optional: without them `/decrease-stock`
//! answers 503 while payments keep working.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use crate::firestore::credentials::CredentialSource;

const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_FIRESTORE_API_BASE: &str = "https://firestore.googleapis.com";
const DEFAULT_FIRESTORE_DATABASE: &str = "(default)";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "change-me",
    "placeholder",
    "replace-me",
    "replace_me",
    "xxxx",
    "<",
    "...",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Relay application configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Stripe API configuration
    pub stripe: StripeConfig,
    /// Firestore stock store configuration
    pub firestore: FirestoreConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Log line format
    pub log_format: LogFormat,
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_live_...` / `sk_test_...`)
    pub secret_key: SecretString,
    /// API base URL, overridable for tests
    pub api_base: Url,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .finish()
    }
}

/// Firestore stock store configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// Explicit service account key source, if any
    pub credential_source: Option<CredentialSource>,
    /// Application-default credentials file (`GOOGLE_APPLICATION_CREDENTIALS`)
    pub application_credentials: Option<PathBuf>,
    /// Project override; otherwise taken from the credential
    pub project_id: Option<String>,
    /// Database ID within the project
    pub database_id: String,
    /// REST API base URL
    pub api_base: Url,
    /// Emulator `host:port`; when set no credentials are needed
    pub emulator_host: Option<String>,
}

impl FirestoreConfig {
    /// Whether any way of reaching the store has been configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.credential_source.is_some()
            || self.application_credentials.is_some()
            || self.emulator_host.is_some()
    }
}

impl RelayConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `STRIPE_SECRET_KEY` is missing or looks like a
    /// placeholder, or if any optional variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`RelayConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);

        let host = env
            .or_default("HOST", "0.0.0.0")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("HOST".to_string(), e.to_string()))?;
        let port = env
            .or_default("PORT", "8787")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORT".to_string(), e.to_string()))?;

        let stripe = StripeConfig::from_env(&env)?;
        let firestore = FirestoreConfig::from_env(&env)?;

        let log_format = match env.optional("LOG_FORMAT").as_deref() {
            Some(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            host,
            port,
            stripe,
            firestore,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
            log_format,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StripeConfig {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        let secret_key = env.validated_secret("STRIPE_SECRET_KEY")?;
        let api_base = env.url_or_default("STRIPE_API_BASE", DEFAULT_STRIPE_API_BASE)?;
        Ok(Self {
            secret_key,
            api_base,
        })
    }
}

impl FirestoreConfig {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        let project_id = env
            .optional("FIREBASE_PROJECT_ID")
            .or_else(|| env.optional("GOOGLE_CLOUD_PROJECT"));

        Ok(Self {
            credential_source: CredentialSource::from_lookup(env.0),
            application_credentials: env
                .optional("GOOGLE_APPLICATION_CREDENTIALS")
                .map(PathBuf::from),
            project_id,
            database_id: env.or_default("FIRESTORE_DATABASE_ID", DEFAULT_FIRESTORE_DATABASE),
            api_base: env.url_or_default("FIRESTORE_API_BASE", DEFAULT_FIRESTORE_API_BASE)?,
            emulator_host: env.optional("FIRESTORE_EMULATOR_HOST"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable lookup with the helpers used while loading.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional variable, treating blank values as absent.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Get a URL variable with a default value.
    fn url_or_default(&self, key: &str, default: &str) -> Result<Url, ConfigError> {
        Url::parse(&self.or_default(key, default))
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    /// Load and validate a required secret.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
}

/// Validate that a secret is not a placeholder.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    if secret.chars().any(char::is_whitespace) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            "contains whitespace".to_string(),
        ));
    }

    let lower = secret.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}

/// Log a warning for Stripe keys that do not look like API keys.
///
/// Not an error: restricted keys and future key formats must keep working.
pub fn warn_on_unusual_stripe_key(config: &StripeConfig) {
    let key = config.secret_key.expose_secret();
    if !(key.starts_with("sk_") || key.starts_with("rk_")) {
        tracing::warn!("STRIPE_SECRET_KEY does not start with sk_ or rk_");
    }
}
