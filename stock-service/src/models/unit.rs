//! Serialized unit model: one row per physical item of a serialized product.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle status of a serialized unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    InStock,
    Sold,
    Removed,
    AdjustedOut,
}

impl UnitStatus {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::InStock => "in_stock",
            UnitStatus::Sold => "sold",
            UnitStatus::Removed => "removed",
            UnitStatus::AdjustedOut => "adjusted_out",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in_stock" => Some(UnitStatus::InStock),
            "sold" => Some(UnitStatus::Sold),
            "removed" => Some(UnitStatus::Removed),
            "adjusted_out" => Some(UnitStatus::AdjustedOut),
            _ => None,
        }
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which of the six link columns a unit transition writes.
///
/// A unit points at the line item that last moved it. The columns are
/// mutually exclusive; `ledger::transition_unit` clears all six and sets
/// exactly one in a single statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Purchase,
    Sale,
    CustomerReturn,
    SupplierReturn,
    AdjustmentIn,
    AdjustmentOut,
}

impl LinkKind {
    /// Get string representation for database and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::Purchase => "purchase",
            LinkKind::Sale => "sale",
            LinkKind::CustomerReturn => "customer_return",
            LinkKind::SupplierReturn => "supplier_return",
            LinkKind::AdjustmentIn => "adjustment_in",
            LinkKind::AdjustmentOut => "adjustment_out",
        }
    }

    /// Column on `product_units` this link kind is stored in.
    pub fn column(&self) -> &'static str {
        match self {
            LinkKind::Purchase => "purchase_line_id",
            LinkKind::Sale => "sale_line_id",
            LinkKind::CustomerReturn => "customer_return_line_id",
            LinkKind::SupplierReturn => "supplier_return_line_id",
            LinkKind::AdjustmentIn => "adjustment_in_line_id",
            LinkKind::AdjustmentOut => "adjustment_out_line_id",
        }
    }
}

impl std::fmt::Display for LinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The line item a unit currently points at, as a tagged value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitLink {
    pub kind: LinkKind,
    pub line_id: Uuid,
}

/// Serialized unit row. Link columns are weak references to transaction
/// lines; at most one is ever non-null.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProductUnit {
    pub unit_id: Uuid,
    pub product_id: Uuid,
    pub serial_number: String,
    pub status: String,
    pub purchase_line_id: Option<Uuid>,
    pub sale_line_id: Option<Uuid>,
    pub customer_return_line_id: Option<Uuid>,
    pub supplier_return_line_id: Option<Uuid>,
    pub adjustment_in_line_id: Option<Uuid>,
    pub adjustment_out_line_id: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl ProductUnit {
    /// Get parsed status.
    pub fn parsed_status(&self) -> Option<UnitStatus> {
        UnitStatus::from_str(&self.status)
    }

    /// The link currently set on this unit, if any.
    pub fn active_link(&self) -> Option<UnitLink> {
        let candidates = [
            (LinkKind::Purchase, self.purchase_line_id),
            (LinkKind::Sale, self.sale_line_id),
            (LinkKind::CustomerReturn, self.customer_return_line_id),
            (LinkKind::SupplierReturn, self.supplier_return_line_id),
            (LinkKind::AdjustmentIn, self.adjustment_in_line_id),
            (LinkKind::AdjustmentOut, self.adjustment_out_line_id),
        ];
        candidates
            .into_iter()
            .find_map(|(kind, line_id)| line_id.map(|line_id| UnitLink { kind, line_id }))
    }

    /// True when no link column is set.
    pub fn is_unlinked(&self) -> bool {
        self.active_link().is_none()
    }
}

/// Projection returned by the availability resolver.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AvailableUnit {
    pub unit_id: Uuid,
    pub serial_number: String,
    pub status: String,
}

impl AvailableUnit {
    /// Get parsed status.
    pub fn parsed_status(&self) -> Option<UnitStatus> {
        UnitStatus::from_str(&self.status)
    }
}

/// Input for creating a serialized unit row directly. Transaction completion
/// creates missing inflow units on its own; this is the standalone path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProductUnit {
    pub product_id: Uuid,
    pub serial_number: String,
    pub created_by: Uuid,
}
