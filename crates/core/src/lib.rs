//! Checkout Relay Core - Shared domain types.
//!
//! This crate provides the types used by the relay binary and its tests:
//! - cart line items and their aggregation into per-size stock decrements
//! - stock record keys as stored in the document store
//! - validated payment amounts and currency codes
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no store access. The transactional side lives in the relay crate.
//!
//! # Modules
//!
//! - [`types`] - Cart, stock and payment types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
