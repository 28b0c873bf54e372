//! Product model for the stock engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Product with its aggregate stock counter.
///
/// `is_serialized` is fixed at creation and decides how stock is tracked:
/// plain products keep a counter in `stock_quantity`, serialized products
/// track individual units and `stock_quantity` mirrors the count of units
/// currently in stock.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub is_serialized: bool,
    pub stock_quantity: i64,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a new product. Stock starts at zero; inventory arrives
/// through purchase transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProduct {
    pub sku: String,
    pub name: String,
    pub is_serialized: bool,
}
