use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Unit not found: product {product_id}, serial '{serial}'")]
    UnitNotFound { product_id: Uuid, serial: String },

    #[error("Invalid product state: {0}")]
    InvalidProductState(String),

    #[error("Sequence not found: '{0}'")]
    SequenceNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}
