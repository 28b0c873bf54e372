//! Stock reconciliation engine for inventory transactions.
//!
//! When a stock transaction (purchase, sale, return, adjustment) reaches the
//! completed state, this crate applies its line items to product stock:
//! aggregate counters for plain products, per-unit status and link fields for
//! serialized products. All mutations run inside a caller-owned database
//! transaction and roll back together on any fatal error.

pub mod config;
pub mod models;
pub mod services;
