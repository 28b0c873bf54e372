//! Database service for stock-service.

use crate::models::{
    CreateProduct, CreateProductUnit, CreateSequence, CreateStockTransaction, LineSerial, Product,
    ProductUnit, Sequence, StockDirection, StockTransaction, TransactionLine, TransactionStatus,
};
use crate::services::metrics::{DB_QUERY_DURATION, ERRORS_TOTAL};
use crate::services::reconciler::{self, load_line_serials, load_lines, load_product};
use crate::services::sequence::next_number_in;
use inventory_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "stock-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Product Operations
    // -------------------------------------------------------------------------

    /// Create a new product with zero stock.
    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn create_product(&self, input: &CreateProduct) -> Result<Product, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_product"])
            .start_timer();

        let product_id = Uuid::new_v4();
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (product_id, sku, name, is_serialized, stock_quantity)
            VALUES ($1, $2, $3, $4, 0)
            RETURNING product_id, sku, name, is_serialized, stock_quantity, created_utc, updated_utc
            "#,
        )
        .bind(product_id)
        .bind(&input.sku)
        .bind(&input.name)
        .bind(input.is_serialized)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Product with SKU '{}' already exists",
                    input.sku
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create product: {}", e)),
        })?;

        timer.observe_duration();

        info!(
            product_id = %product.product_id,
            is_serialized = product.is_serialized,
            "Product created"
        );

        Ok(product)
    }

    /// Get a product by ID.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, sku, name, is_serialized, stock_quantity, created_utc, updated_utc
            FROM products
            WHERE product_id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get product: {}", e)))?;

        timer.observe_duration();

        Ok(product)
    }

    /// Get a product by SKU.
    #[instrument(skip(self), fields(sku = %sku))]
    pub async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_product_by_sku"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, sku, name, is_serialized, stock_quantity, created_utc, updated_utc
            FROM products
            WHERE sku = $1
            "#,
        )
        .bind(sku)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get product: {}", e)))?;

        timer.observe_duration();

        Ok(product)
    }

    // -------------------------------------------------------------------------
    // Unit Operations
    // -------------------------------------------------------------------------

    /// Create a serialized unit in stock. Serial numbers are globally unique.
    #[instrument(skip(self, input), fields(product_id = %input.product_id, serial = %input.serial_number))]
    pub async fn create_unit(&self, input: &CreateProductUnit) -> Result<ProductUnit, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_unit"])
            .start_timer();

        let unit_id = Uuid::new_v4();
        let unit = sqlx::query_as::<_, ProductUnit>(
            r#"
            INSERT INTO product_units (unit_id, product_id, serial_number, status, updated_by)
            VALUES ($1, $2, $3, 'in_stock', $4)
            RETURNING unit_id, product_id, serial_number, status,
                purchase_line_id, sale_line_id, customer_return_line_id,
                supplier_return_line_id, adjustment_in_line_id, adjustment_out_line_id,
                updated_by, created_utc, updated_utc
            "#,
        )
        .bind(unit_id)
        .bind(input.product_id)
        .bind(&input.serial_number)
        .bind(input.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Unit with serial '{}' already exists",
                    input.serial_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create unit: {}", e)),
        })?;

        timer.observe_duration();

        info!(unit_id = %unit.unit_id, "Unit created");

        Ok(unit)
    }

    /// Get a unit by product and exact serial number.
    #[instrument(skip(self), fields(product_id = %product_id, serial = %serial_number))]
    pub async fn get_unit_by_serial(
        &self,
        product_id: Uuid,
        serial_number: &str,
    ) -> Result<Option<ProductUnit>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_unit_by_serial"])
            .start_timer();

        let unit = sqlx::query_as::<_, ProductUnit>(
            r#"
            SELECT unit_id, product_id, serial_number, status,
                purchase_line_id, sale_line_id, customer_return_line_id,
                supplier_return_line_id, adjustment_in_line_id, adjustment_out_line_id,
                updated_by, created_utc, updated_utc
            FROM product_units
            WHERE product_id = $1 AND serial_number = $2
            "#,
        )
        .bind(product_id)
        .bind(serial_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get unit: {}", e)))?;

        timer.observe_duration();

        Ok(unit)
    }

    /// List all units of a product, ordered by serial number.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn list_units_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<ProductUnit>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_units_for_product"])
            .start_timer();

        let units = sqlx::query_as::<_, ProductUnit>(
            r#"
            SELECT unit_id, product_id, serial_number, status,
                purchase_line_id, sale_line_id, customer_return_line_id,
                supplier_return_line_id, adjustment_in_line_id, adjustment_out_line_id,
                updated_by, created_utc, updated_utc
            FROM product_units
            WHERE product_id = $1
            ORDER BY serial_number
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list units: {}", e)))?;

        timer.observe_duration();

        Ok(units)
    }

    // -------------------------------------------------------------------------
    // Sequence Operations
    // -------------------------------------------------------------------------

    /// Register a document number sequence starting at zero.
    #[instrument(skip(self, input), fields(sequence_type = %input.sequence_type))]
    pub async fn create_sequence(&self, input: &CreateSequence) -> Result<Sequence, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_sequence"])
            .start_timer();

        let sequence = sqlx::query_as::<_, Sequence>(
            r#"
            INSERT INTO sequences (sequence_type, prefix, last_number)
            VALUES ($1, $2, 0)
            RETURNING sequence_type, prefix, last_number, updated_utc
            "#,
        )
        .bind(&input.sequence_type)
        .bind(&input.prefix)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Sequence '{}' already exists",
                    input.sequence_type
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create sequence: {}", e)),
        })?;

        timer.observe_duration();

        info!(sequence_type = %sequence.sequence_type, prefix = %sequence.prefix, "Sequence created");

        Ok(sequence)
    }

    /// Get a sequence by type.
    #[instrument(skip(self))]
    pub async fn get_sequence(&self, sequence_type: &str) -> Result<Option<Sequence>, AppError> {
        let sequence = sqlx::query_as::<_, Sequence>(
            r#"
            SELECT sequence_type, prefix, last_number, updated_utc
            FROM sequences
            WHERE sequence_type = $1
            "#,
        )
        .bind(sequence_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get sequence: {}", e)))?;

        Ok(sequence)
    }

    // -------------------------------------------------------------------------
    // Transaction Operations
    // -------------------------------------------------------------------------

    /// Create a pending stock transaction with its lines and chosen serials.
    ///
    /// The document reference is assigned from the sequence named after the
    /// transaction type, inside the same database transaction as the inserts,
    /// so a failed create never consumes a number.
    #[instrument(skip(self, input), fields(transaction_type = %input.transaction_type, line_count = input.lines.len()))]
    pub async fn create_transaction(
        &self,
        input: &CreateStockTransaction,
    ) -> Result<StockTransaction, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_transaction"])
            .start_timer();

        for (i, line) in input.lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(AppError::Validation(format!(
                    "Line {} quantity must be positive",
                    i + 1
                )));
            }
        }

        // Validate all referenced products exist before writing anything
        let product_ids: Vec<Uuid> = input.lines.iter().map(|l| l.product_id).collect();
        let known: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT product_id FROM products WHERE product_id = ANY($1)
            "#,
        )
        .bind(&product_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch products: {}", e)))?;

        for line in &input.lines {
            if !known.contains(&line.product_id) {
                return Err(AppError::ProductNotFound(line.product_id));
            }
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let reference = next_number_in(&mut *tx, input.transaction_type.as_str()).await?;

        let transaction_id = Uuid::new_v4();
        let transaction = sqlx::query_as::<_, StockTransaction>(
            r#"
            INSERT INTO stock_transactions (transaction_id, reference, transaction_type, status, notes, created_by)
            VALUES ($1, $2, $3, 'pending', $4, $5)
            RETURNING transaction_id, reference, transaction_type, status, notes,
                created_by, completed_by, created_utc, completed_utc
            "#,
        )
        .bind(transaction_id)
        .bind(&reference)
        .bind(input.transaction_type.as_str())
        .bind(&input.notes)
        .bind(input.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert transaction: {}", e))
        })?;

        for (i, line) in input.lines.iter().enumerate() {
            let line_id = Uuid::new_v4();
            sqlx::query(
                r#"
                INSERT INTO transaction_lines (line_id, transaction_id, product_id, quantity, unit_price, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(line_id)
            .bind(transaction_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(i as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert line: {}", e))
            })?;

            self.attach_serials(&mut tx, line_id, StockDirection::Inflow, &line.inflow_serials)
                .await?;
            self.attach_serials(&mut tx, line_id, StockDirection::Outflow, &line.outflow_serials)
                .await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            transaction_id = %transaction.transaction_id,
            reference = %transaction.reference,
            line_count = input.lines.len(),
            "Stock transaction created"
        );

        Ok(transaction)
    }

    async fn attach_serials(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        line_id: Uuid,
        direction: StockDirection,
        serials: &[String],
    ) -> Result<(), AppError> {
        for (position, serial) in serials.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO transaction_line_serials (line_id, serial_number, direction, position)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(line_id)
            .bind(serial)
            .bind(direction.as_str())
            .bind(position as i32)
            .execute(&mut **tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    AppError::Validation(format!("Duplicate serial '{}' on a line", serial))
                }
                _ => AppError::DatabaseError(anyhow::anyhow!("Failed to attach serial: {}", e)),
            })?;
        }
        Ok(())
    }

    /// Get a transaction by ID.
    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    pub async fn get_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<StockTransaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_transaction"])
            .start_timer();

        let transaction = sqlx::query_as::<_, StockTransaction>(
            r#"
            SELECT transaction_id, reference, transaction_type, status, notes,
                created_by, completed_by, created_utc, completed_utc
            FROM stock_transactions
            WHERE transaction_id = $1
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get transaction: {}", e))
        })?;

        timer.observe_duration();

        Ok(transaction)
    }

    /// Get a transaction's lines in stored insertion order.
    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    pub async fn get_lines(
        &self,
        transaction_id: Uuid,
    ) -> Result<Vec<TransactionLine>, AppError> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to acquire connection: {}", e))
        })?;
        load_lines(&mut *conn, transaction_id).await
    }

    /// Get the serials chosen for a line.
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub async fn get_line_serials(&self, line_id: Uuid) -> Result<Vec<LineSerial>, AppError> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to acquire connection: {}", e))
        })?;
        load_line_serials(&mut *conn, line_id).await
    }

    /// Complete a pending transaction and reconcile its stock effects, all in
    /// one database transaction.
    ///
    /// The document row is locked first, so concurrent completions serialize
    /// and the pending-to-completed flip happens exactly once; a transaction
    /// that is already completed is returned unchanged. Before reconciling,
    /// unit rows are created for inflow serials that do not exist yet (the
    /// reconciler itself never creates units). Any error rolls back the
    /// status flip, the created units, and every stock mutation together.
    #[instrument(skip(self), fields(transaction_id = %transaction_id, actor_id = %actor_id))]
    pub async fn complete_transaction(
        &self,
        transaction_id: Uuid,
        actor_id: Uuid,
    ) -> Result<StockTransaction, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["complete_transaction"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let existing = sqlx::query_as::<_, StockTransaction>(
            r#"
            SELECT transaction_id, reference, transaction_type, status, notes,
                created_by, completed_by, created_utc, completed_utc
            FROM stock_transactions
            WHERE transaction_id = $1
            FOR UPDATE
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to lock transaction: {}", e))
        })?
        .ok_or(AppError::TransactionNotFound(transaction_id))?;

        match existing.parsed_status() {
            Some(TransactionStatus::Completed) => {
                info!(
                    transaction_id = %transaction_id,
                    reference = %existing.reference,
                    "Transaction already completed; nothing to do"
                );
                return Ok(existing);
            }
            Some(TransactionStatus::Pending) => {}
            _ => {
                return Err(AppError::Validation(format!(
                    "Transaction {} cannot be completed from status '{}'",
                    transaction_id, existing.status
                )));
            }
        }

        let completed = sqlx::query_as::<_, StockTransaction>(
            r#"
            UPDATE stock_transactions
            SET status = 'completed', completed_by = $2, completed_utc = NOW()
            WHERE transaction_id = $1
            RETURNING transaction_id, reference, transaction_type, status, notes,
                created_by, completed_by, created_utc, completed_utc
            "#,
        )
        .bind(transaction_id)
        .bind(actor_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to complete transaction: {}", e))
        })?;

        self.create_inflow_units(&mut tx, &completed, actor_id).await?;

        let applied = match reconciler::reconcile(&mut *tx, &completed, actor_id).await {
            Ok(applied) => applied,
            Err(e) => {
                ERRORS_TOTAL.with_label_values(&["reconcile"]).inc();
                return Err(e);
            }
        };

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            transaction_id = %completed.transaction_id,
            reference = %completed.reference,
            applied,
            "Transaction completed"
        );

        Ok(completed)
    }

    /// Create unit rows for inflow serials that do not exist yet, so the
    /// reconciler finds every serial it is about to transition.
    async fn create_inflow_units(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        transaction: &StockTransaction,
        actor_id: Uuid,
    ) -> Result<(), AppError> {
        let lines = load_lines(&mut **tx, transaction.transaction_id).await?;

        for line in &lines {
            let product = load_product(&mut **tx, line.product_id).await?;
            if !product.is_serialized {
                continue;
            }

            let serials = load_line_serials(&mut **tx, line.line_id).await?;
            for serial in serials
                .iter()
                .filter(|s| s.parsed_direction() == Some(StockDirection::Inflow))
            {
                let existing: Option<Uuid> = sqlx::query_scalar(
                    r#"
                    SELECT unit_id FROM product_units
                    WHERE product_id = $1 AND serial_number = $2
                    "#,
                )
                .bind(line.product_id)
                .bind(&serial.serial_number)
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to check unit: {}", e))
                })?;

                if existing.is_some() {
                    continue;
                }

                sqlx::query(
                    r#"
                    INSERT INTO product_units (unit_id, product_id, serial_number, status, updated_by)
                    VALUES ($1, $2, $3, 'in_stock', $4)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(line.product_id)
                .bind(&serial.serial_number)
                .bind(actor_id)
                .execute(&mut **tx)
                .await
                .map_err(|e| match e {
                    sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                        AppError::Conflict(anyhow::anyhow!(
                            "Serial '{}' already exists on another product",
                            serial.serial_number
                        ))
                    }
                    _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create unit: {}", e)),
                })?;

                debug!(
                    line_id = %line.line_id,
                    serial = %serial.serial_number,
                    "Unit created for inflow serial"
                );
            }
        }

        Ok(())
    }

    /// Cancel a pending transaction. Cancelled documents never touch stock.
    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    pub async fn cancel_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<StockTransaction, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["cancel_transaction"])
            .start_timer();

        let existing = self
            .get_transaction(transaction_id)
            .await?
            .ok_or(AppError::TransactionNotFound(transaction_id))?;

        match existing.parsed_status() {
            Some(TransactionStatus::Pending) => {}
            _ => {
                return Err(AppError::Validation(format!(
                    "Only pending transactions can be cancelled (status '{}')",
                    existing.status
                )));
            }
        }

        let cancelled = sqlx::query_as::<_, StockTransaction>(
            r#"
            UPDATE stock_transactions
            SET status = 'cancelled'
            WHERE transaction_id = $1 AND status = 'pending'
            RETURNING transaction_id, reference, transaction_type, status, notes,
                created_by, completed_by, created_utc, completed_utc
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to cancel transaction: {}", e))
        })?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!(
                "Transaction {} changed state concurrently",
                transaction_id
            ))
        })?;

        timer.observe_duration();

        info!(
            transaction_id = %cancelled.transaction_id,
            reference = %cancelled.reference,
            "Transaction cancelled"
        );

        Ok(cancelled)
    }
}
