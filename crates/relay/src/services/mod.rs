//! Request-level business logic.
//!
//! - [`validation`] - body parsing and field checks for both endpoints
//! - [`inventory`] - all-or-nothing stock decrements

pub mod inventory;
pub mod validation;

pub use inventory::{TransactionError, decrease_stock};
pub use validation::{ItemOutcome, ValidationError};
