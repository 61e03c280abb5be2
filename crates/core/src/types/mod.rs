//! Core types for the checkout relay.
//!
//! This module provides type-safe wrappers for the relay's domain concepts.

pub mod cart;
pub mod payment;
pub mod stock;

pub use cart::{
    AggregatedStock, AggregatedStockEntry, CartLineItem, RESERVED_PRODUCT_PREFIX, is_stock_product,
};
pub use payment::{Amount, CurrencyCode, PaymentError, PaymentIntent, PaymentIntentRequest};
pub use stock::{StockKey, StockRecord};
