//! Stock effect lookup: what a completed line item does to stock.

use crate::models::transaction::TransactionType;
use crate::models::unit::{LinkKind, UnitStatus};
use serde::{Deserialize, Serialize};

/// Direction a line item moves stock in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockDirection {
    #[serde(rename = "in")]
    Inflow,
    #[serde(rename = "out")]
    Outflow,
}

impl StockDirection {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            StockDirection::Inflow => "in",
            StockDirection::Outflow => "out",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in" => Some(StockDirection::Inflow),
            "out" => Some(StockDirection::Outflow),
            _ => None,
        }
    }
}

impl std::fmt::Display for StockDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-line stock effect: the aggregate direction, the status serialized
/// units end up in, and the link column that records which line moved them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEffect {
    pub direction: StockDirection,
    pub unit_status: UnitStatus,
    pub link: LinkKind,
}

impl StockEffect {
    /// Resolve the effect for a line of the given transaction type.
    ///
    /// Adjustments are the one direction-ambiguous type: the chosen serial
    /// set decides, inflow winning when both are populated. An adjustment
    /// with neither set resolves to `None` and the line is skipped.
    pub fn resolve(
        transaction_type: TransactionType,
        has_inflow_serials: bool,
        has_outflow_serials: bool,
    ) -> Option<StockEffect> {
        match transaction_type {
            TransactionType::Purchase => Some(StockEffect {
                direction: StockDirection::Inflow,
                unit_status: UnitStatus::InStock,
                link: LinkKind::Purchase,
            }),
            TransactionType::Sale => Some(StockEffect {
                direction: StockDirection::Outflow,
                unit_status: UnitStatus::Sold,
                link: LinkKind::Sale,
            }),
            TransactionType::CustomerReturn => Some(StockEffect {
                direction: StockDirection::Inflow,
                unit_status: UnitStatus::InStock,
                link: LinkKind::CustomerReturn,
            }),
            TransactionType::SupplierReturn => Some(StockEffect {
                direction: StockDirection::Outflow,
                unit_status: UnitStatus::Removed,
                link: LinkKind::SupplierReturn,
            }),
            TransactionType::StockAdjustment if has_inflow_serials => Some(StockEffect {
                direction: StockDirection::Inflow,
                unit_status: UnitStatus::InStock,
                link: LinkKind::AdjustmentIn,
            }),
            TransactionType::StockAdjustment if has_outflow_serials => Some(StockEffect {
                direction: StockDirection::Outflow,
                unit_status: UnitStatus::AdjustedOut,
                link: LinkKind::AdjustmentOut,
            }),
            TransactionType::StockAdjustment => None,
        }
    }

    /// Signed aggregate delta for a line of the given quantity.
    pub fn signed_quantity(&self, quantity: i64) -> i64 {
        match self.direction {
            StockDirection::Inflow => quantity,
            StockDirection::Outflow => -quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchase_is_inflow_to_in_stock() {
        let effect = StockEffect::resolve(TransactionType::Purchase, false, false).unwrap();
        assert_eq!(effect.direction, StockDirection::Inflow);
        assert_eq!(effect.unit_status, UnitStatus::InStock);
        assert_eq!(effect.link, LinkKind::Purchase);
        assert_eq!(effect.signed_quantity(4), 4);
    }

    #[test]
    fn sale_is_outflow_to_sold() {
        let effect = StockEffect::resolve(TransactionType::Sale, false, false).unwrap();
        assert_eq!(effect.direction, StockDirection::Outflow);
        assert_eq!(effect.unit_status, UnitStatus::Sold);
        assert_eq!(effect.link, LinkKind::Sale);
        assert_eq!(effect.signed_quantity(4), -4);
    }

    #[test]
    fn customer_return_restocks() {
        let effect = StockEffect::resolve(TransactionType::CustomerReturn, false, false).unwrap();
        assert_eq!(effect.direction, StockDirection::Inflow);
        assert_eq!(effect.unit_status, UnitStatus::InStock);
        assert_eq!(effect.link, LinkKind::CustomerReturn);
    }

    #[test]
    fn supplier_return_removes() {
        let effect = StockEffect::resolve(TransactionType::SupplierReturn, false, false).unwrap();
        assert_eq!(effect.direction, StockDirection::Outflow);
        assert_eq!(effect.unit_status, UnitStatus::Removed);
        assert_eq!(effect.link, LinkKind::SupplierReturn);
    }

    #[test]
    fn adjustment_direction_follows_populated_serial_set() {
        let inflow = StockEffect::resolve(TransactionType::StockAdjustment, true, false).unwrap();
        assert_eq!(inflow.direction, StockDirection::Inflow);
        assert_eq!(inflow.unit_status, UnitStatus::InStock);
        assert_eq!(inflow.link, LinkKind::AdjustmentIn);

        let outflow = StockEffect::resolve(TransactionType::StockAdjustment, false, true).unwrap();
        assert_eq!(outflow.direction, StockDirection::Outflow);
        assert_eq!(outflow.unit_status, UnitStatus::AdjustedOut);
        assert_eq!(outflow.link, LinkKind::AdjustmentOut);
    }

    #[test]
    fn adjustment_prefers_inflow_when_both_sets_populated() {
        let effect = StockEffect::resolve(TransactionType::StockAdjustment, true, true).unwrap();
        assert_eq!(effect.link, LinkKind::AdjustmentIn);
    }

    #[test]
    fn adjustment_with_no_serials_resolves_to_none() {
        assert_eq!(
            StockEffect::resolve(TransactionType::StockAdjustment, false, false),
            None
        );
    }

    #[test]
    fn direction_round_trips_through_strings() {
        assert_eq!(StockDirection::from_str("in"), Some(StockDirection::Inflow));
        assert_eq!(
            StockDirection::from_str("out"),
            Some(StockDirection::Outflow)
        );
        assert_eq!(StockDirection::from_str("both"), None);
    }
}
