//! Transaction reconciliation: applies a completed transaction's line items
//! to stock.
//!
//! The reconciler never owns the database transaction. It runs on the
//! caller's connection, so the status flip, unit creation, and every stock
//! mutation commit or roll back together.

use crate::models::{
    LineSerial, Product, StockDirection, StockEffect, StockTransaction, TransactionLine,
    TransactionStatus,
};
use crate::services::ledger;
use crate::services::metrics::{RECONCILED_LINES_TOTAL, RECONCILIATIONS_TOTAL};
use inventory_core::error::AppError;
use sqlx::PgConnection;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

enum LineOutcome {
    Applied,
    Skipped,
}

/// Apply the stock effects of `transaction` on the caller's connection.
///
/// Returns `Ok(false)` without touching anything when the transaction is not
/// in the completed state, so callers may invoke it unconditionally. Any
/// fatal error (missing product, missing unit, wrong stock representation)
/// propagates untouched; the caller's rollback then undoes every line,
/// including the ones already applied.
#[instrument(
    skip(conn, transaction),
    fields(transaction_id = %transaction.transaction_id, reference = %transaction.reference)
)]
pub async fn reconcile(
    conn: &mut PgConnection,
    transaction: &StockTransaction,
    actor_id: Uuid,
) -> Result<bool, AppError> {
    if transaction.parsed_status() != Some(TransactionStatus::Completed) {
        debug!(
            status = %transaction.status,
            "Transaction not completed; nothing to reconcile"
        );
        RECONCILIATIONS_TOTAL.with_label_values(&["noop"]).inc();
        return Ok(false);
    }

    let lines = load_lines(conn, transaction.transaction_id).await?;

    let mut applied = 0u64;
    let mut skipped = 0u64;
    for line in &lines {
        match process_line(conn, transaction, line, actor_id).await? {
            LineOutcome::Applied => applied += 1,
            LineOutcome::Skipped => skipped += 1,
        }
    }

    RECONCILED_LINES_TOTAL
        .with_label_values(&["applied"])
        .inc_by(applied as f64);
    RECONCILED_LINES_TOTAL
        .with_label_values(&["skipped"])
        .inc_by(skipped as f64);
    RECONCILIATIONS_TOTAL
        .with_label_values(&["completed"])
        .inc();

    info!(
        lines = lines.len(),
        applied,
        skipped,
        "Stock reconciled"
    );

    Ok(true)
}

/// Apply one line item, or skip it with a warning for the tolerated cases
/// (unrecognized transaction type, adjustment without serials).
async fn process_line(
    conn: &mut PgConnection,
    transaction: &StockTransaction,
    line: &TransactionLine,
    actor_id: Uuid,
) -> Result<LineOutcome, AppError> {
    let product = load_product(conn, line.product_id).await?;
    let serials = load_line_serials(conn, line.line_id).await?;

    let inflow: Vec<&LineSerial> = serials
        .iter()
        .filter(|s| s.parsed_direction() == Some(StockDirection::Inflow))
        .collect();
    let outflow: Vec<&LineSerial> = serials
        .iter()
        .filter(|s| s.parsed_direction() == Some(StockDirection::Outflow))
        .collect();

    let transaction_type = match transaction.parsed_type() {
        Some(t) => t,
        None => {
            warn!(
                line_id = %line.line_id,
                transaction_type = %transaction.transaction_type,
                "Unrecognized transaction type; line skipped"
            );
            return Ok(LineOutcome::Skipped);
        }
    };

    let effect = match StockEffect::resolve(transaction_type, !inflow.is_empty(), !outflow.is_empty())
    {
        Some(effect) => effect,
        None => {
            warn!(
                line_id = %line.line_id,
                "Stock adjustment line has no serials; line skipped"
            );
            return Ok(LineOutcome::Skipped);
        }
    };

    if !product.is_serialized {
        ledger::apply_aggregate_delta(conn, &product, effect.signed_quantity(line.quantity))
            .await?;
        return Ok(LineOutcome::Applied);
    }

    let chosen = match effect.direction {
        StockDirection::Inflow => &inflow,
        StockDirection::Outflow => &outflow,
    };
    if chosen.len() as i64 != line.quantity {
        warn!(
            line_id = %line.line_id,
            serial_count = chosen.len(),
            quantity = line.quantity,
            "Serial count differs from line quantity"
        );
    }

    for serial in chosen {
        ledger::transition_unit(
            conn,
            product.product_id,
            &serial.serial_number,
            effect.unit_status,
            effect.link,
            line.line_id,
            actor_id,
        )
        .await?;
    }

    ledger::recompute_aggregate_from_units(conn, &product).await?;

    Ok(LineOutcome::Applied)
}

/// Load a product and lock its row for the remainder of the caller's
/// transaction, serializing concurrent reconciliations of the same product.
pub(crate) async fn load_product(
    conn: &mut PgConnection,
    product_id: Uuid,
) -> Result<Product, AppError> {
    sqlx::query_as::<_, Product>(
        r#"
        SELECT product_id, sku, name, is_serialized, stock_quantity, created_utc, updated_utc
        FROM products
        WHERE product_id = $1
        FOR UPDATE
        "#,
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load product: {}", e)))?
    .ok_or(AppError::ProductNotFound(product_id))
}

/// Load a transaction's line items in stored insertion order.
pub(crate) async fn load_lines(
    conn: &mut PgConnection,
    transaction_id: Uuid,
) -> Result<Vec<TransactionLine>, AppError> {
    sqlx::query_as::<_, TransactionLine>(
        r#"
        SELECT line_id, transaction_id, product_id, quantity, unit_price, position, created_utc
        FROM transaction_lines
        WHERE transaction_id = $1
        ORDER BY position
        "#,
    )
    .bind(transaction_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load lines: {}", e)))
}

/// Load the serials chosen for a line, in the order they were picked.
pub(crate) async fn load_line_serials(
    conn: &mut PgConnection,
    line_id: Uuid,
) -> Result<Vec<LineSerial>, AppError> {
    sqlx::query_as::<_, LineSerial>(
        r#"
        SELECT line_id, serial_number, direction, position
        FROM transaction_line_serials
        WHERE line_id = $1
        ORDER BY direction, position
        "#,
    )
    .bind(line_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load line serials: {}", e)))
}
