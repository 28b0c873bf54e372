//! Service layer for stock-service.

pub mod availability;
pub mod database;
pub mod ledger;
pub mod metrics;
pub mod reconciler;
pub mod sequence;
