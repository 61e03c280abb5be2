//! Payment intent request and response types.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when building payment values.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// Amount is zero.
    #[error("amount must be greater than zero")]
    ZeroAmount,
    /// Currency code is empty.
    #[error("currency cannot be empty")]
    EmptyCurrency,
}

/// A charge amount in the currency's smallest unit (e.g. cents).
///
/// Always greater than zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Amount(u64);

impl Amount {
    /// Create an amount in minor units.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::ZeroAmount`] if `minor_units` is zero.
    pub const fn new(minor_units: u64) -> Result<Self, PaymentError> {
        if minor_units == 0 {
            return Err(PaymentError::ZeroAmount);
        }
        Ok(Self(minor_units))
    }

    /// Amount in minor units.
    #[must_use]
    pub const fn minor_units(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for Amount {
    type Error = PaymentError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for u64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A lower-cased currency code as sent to the payment provider.
///
/// The provider is the authority on which codes exist; this type only
/// guarantees the value is non-empty and lower-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parse a currency code, lower-casing it.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::EmptyCurrency`] if the input is empty.
    pub fn parse(s: &str) -> Result<Self, PaymentError> {
        if s.is_empty() {
            return Err(PaymentError::EmptyCurrency);
        }
        Ok(Self(s.to_lowercase()))
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CurrencyCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A validated request to create a payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentRequest {
    pub amount: Amount,
    pub currency: CurrencyCode,
    /// Customer email; only used as receipt destination when non-empty.
    pub customer_email: Option<String>,
    /// Customer name, stored on the intent's metadata.
    pub customer_name: Option<String>,
}

impl PaymentIntentRequest {
    /// Email to send the receipt to, if one was provided.
    #[must_use]
    pub fn receipt_email(&self) -> Option<&str> {
        self.customer_email.as_deref().filter(|email| !email.is_empty())
    }

    /// Customer name for metadata; empty when absent.
    #[must_use]
    pub fn metadata_customer_name(&self) -> &str {
        self.customer_name.as_deref().unwrap_or_default()
    }
}

/// The parts of a created payment intent the relay hands back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Provider intent ID (e.g. `pi_...`).
    pub id: String,
    /// Secret the client uses to confirm the payment.
    pub client_secret: String,
}
