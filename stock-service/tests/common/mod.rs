//! Common test utilities for stock-service integration tests.

use inventory_core::config::Config as CommonConfig;
use rust_decimal::Decimal;
use std::sync::Once;
use stock_service::config::{DatabaseConfig, StockConfig};
use stock_service::models::{
    CreateProduct, CreateStockTransaction, CreateTransactionLine, Product, StockTransaction,
    TransactionType,
};
use stock_service::services::database::Database;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,stock_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Connect to the test database and bring the schema up to date.
pub async fn test_db() -> Database {
    init_tracing();
    dotenvy::dotenv().ok();

    let database_url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set - use scripts/integ-tests.sh to run tests");

    let config = StockConfig {
        common: CommonConfig {
            app_env: "test".to_string(),
        },
        service_name: "stock-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        database: DatabaseConfig {
            url: database_url,
            max_connections: 5,
            min_connections: 1,
        },
    };

    let db = Database::new(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await
    .expect("Failed to connect to test database");
    db.run_migrations().await.expect("Failed to run migrations");
    db
}

/// SKU that cannot collide across concurrently running tests.
pub fn unique_sku() -> String {
    format!("SKU-{}", Uuid::new_v4().simple())
}

/// Serial number that cannot collide across concurrently running tests.
pub fn unique_serial() -> String {
    format!("SN-{}", Uuid::new_v4().simple())
}

/// Helper to create a product for testing.
pub async fn create_test_product(db: &Database, is_serialized: bool) -> Product {
    db.create_product(&CreateProduct {
        sku: unique_sku(),
        name: "Test product".to_string(),
        is_serialized,
    })
    .await
    .expect("Failed to create product")
}

/// Build a one-line transaction input carrying the given serial choices.
pub fn one_line_input(
    transaction_type: TransactionType,
    product_id: Uuid,
    quantity: i64,
    inflow_serials: Vec<String>,
    outflow_serials: Vec<String>,
) -> CreateStockTransaction {
    CreateStockTransaction {
        transaction_type,
        notes: None,
        created_by: Uuid::new_v4(),
        lines: vec![CreateTransactionLine {
            product_id,
            quantity,
            unit_price: Decimal::new(999, 2),
            inflow_serials,
            outflow_serials,
        }],
    }
}

/// Create and complete a transaction in one step, returning the completed row.
pub async fn complete_new_transaction(
    db: &Database,
    input: &CreateStockTransaction,
) -> StockTransaction {
    let transaction = db
        .create_transaction(input)
        .await
        .expect("Failed to create transaction");
    db.complete_transaction(transaction.transaction_id, input.created_by)
        .await
        .expect("Failed to complete transaction")
}

/// Create and complete a purchase bringing the given serials into stock.
pub async fn receive_units(db: &Database, product_id: Uuid, serials: &[String]) -> StockTransaction {
    let input = one_line_input(
        TransactionType::Purchase,
        product_id,
        serials.len() as i64,
        serials.to_vec(),
        vec![],
    );
    complete_new_transaction(db, &input).await
}

/// Current aggregate stock for a product.
pub async fn stock_of(db: &Database, product_id: Uuid) -> i64 {
    db.get_product(product_id)
        .await
        .expect("Failed to get product")
        .expect("Product should exist")
        .stock_quantity
}
