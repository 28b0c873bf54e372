//! Domain models for stock-service.

mod effect;
mod product;
mod sequence;
mod transaction;
mod unit;

pub use effect::{StockDirection, StockEffect};
pub use product::{CreateProduct, Product};
pub use sequence::{CreateSequence, Sequence};
pub use transaction::{
    CreateStockTransaction, CreateTransactionLine, LineSerial, StockTransaction, TransactionLine,
    TransactionStatus, TransactionType,
};
pub use unit::{AvailableUnit, CreateProductUnit, LinkKind, ProductUnit, UnitLink, UnitStatus};
