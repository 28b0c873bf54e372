//! Stock transaction model: document header, line items, and chosen serials.

use crate::models::effect::StockDirection;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Document type of a stock transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Purchase,
    Sale,
    CustomerReturn,
    SupplierReturn,
    StockAdjustment,
}

impl TransactionType {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Purchase => "purchase",
            TransactionType::Sale => "sale",
            TransactionType::CustomerReturn => "customer_return",
            TransactionType::SupplierReturn => "supplier_return",
            TransactionType::StockAdjustment => "stock_adjustment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(TransactionType::Purchase),
            "sale" => Some(TransactionType::Sale),
            "customer_return" => Some(TransactionType::CustomerReturn),
            "supplier_return" => Some(TransactionType::SupplierReturn),
            "stock_adjustment" => Some(TransactionType::StockAdjustment),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a stock transaction. Stock effects apply exactly once,
/// on the pending-to-completed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "cancelled" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stock transaction document. Type and status are kept as strings on the
/// row; unrecognized stored values parse to `None` and reconciliation skips
/// them instead of failing.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StockTransaction {
    pub transaction_id: Uuid,
    pub reference: String,
    pub transaction_type: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub completed_by: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub completed_utc: Option<DateTime<Utc>>,
}

impl StockTransaction {
    /// Get parsed transaction type.
    pub fn parsed_type(&self) -> Option<TransactionType> {
        TransactionType::from_str(&self.transaction_type)
    }

    /// Get parsed status.
    pub fn parsed_status(&self) -> Option<TransactionStatus> {
        TransactionStatus::from_str(&self.status)
    }
}

/// Line item of a stock transaction. `position` preserves insertion order;
/// reconciliation processes lines in that order.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TransactionLine {
    pub line_id: Uuid,
    pub transaction_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub position: i32,
    pub created_utc: DateTime<Utc>,
}

/// Serial number chosen for a line while composing it, tagged with the stock
/// direction it participates in.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LineSerial {
    pub line_id: Uuid,
    pub serial_number: String,
    pub direction: String,
    pub position: i32,
}

impl LineSerial {
    /// Get parsed direction.
    pub fn parsed_direction(&self) -> Option<StockDirection> {
        StockDirection::from_str(&self.direction)
    }
}

/// Input for creating a transaction document with its lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStockTransaction {
    pub transaction_type: TransactionType,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub lines: Vec<CreateTransactionLine>,
}

/// Input for a single line item. Serial lists are only meaningful for
/// serialized products; for adjustments, whichever list is non-empty decides
/// the direction of the line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransactionLine {
    pub product_id: Uuid,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub inflow_serials: Vec<String>,
    pub outflow_serials: Vec<String>,
}
