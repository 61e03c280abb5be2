//! Checkout relay library.
//!
//! A small backend between the storefront checkout and two vendors:
//!
//! - **Stripe**: `POST /payment-intent` validates the amount and currency and
//!   creates a payment intent, returning its client secret.
//! - **Cloud Firestore**: `POST /decrease-stock` aggregates the paid cart by
//!   product and size and decrements every stock record in one transaction.
//!
//! The binary in `main.rs` wires configuration, logging and Sentry around
//! [`routes::router`]; everything else lives here so it can be tested.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod firestore;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod stripe;

pub use routes::router;
pub use state::AppState;
