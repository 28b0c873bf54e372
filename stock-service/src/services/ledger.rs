//! Inventory ledger: the primitives that mutate stock.
//!
//! Every function here takes `&mut PgConnection` so it runs inside whatever
//! unit of work the caller owns. Nothing commits; fatal errors propagate so
//! the caller's transaction rolls back as a whole.

use crate::models::{LinkKind, Product, ProductUnit, UnitStatus};
use crate::services::metrics::{DB_QUERY_DURATION, UNITS_TRANSITIONED_TOTAL};
use inventory_core::error::AppError;
use sqlx::PgConnection;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Apply a signed delta to a plain product's aggregate counter and return
/// the new quantity.
///
/// Serialized products reject this: their counter is derived from units and
/// a direct delta would desynchronize it.
#[instrument(skip(conn, product), fields(product_id = %product.product_id, delta = delta))]
pub async fn apply_aggregate_delta(
    conn: &mut PgConnection,
    product: &Product,
    delta: i64,
) -> Result<i64, AppError> {
    if product.is_serialized {
        return Err(AppError::InvalidProductState(format!(
            "Product {} is serialized; aggregate deltas are not allowed",
            product.product_id
        )));
    }

    let timer = DB_QUERY_DURATION
        .with_label_values(&["apply_aggregate_delta"])
        .start_timer();

    let quantity: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE products
        SET stock_quantity = stock_quantity + $2, updated_utc = NOW()
        WHERE product_id = $1
        RETURNING stock_quantity
        "#,
    )
    .bind(product.product_id)
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update stock: {}", e)))?;

    timer.observe_duration();

    let quantity = quantity.ok_or(AppError::ProductNotFound(product.product_id))?;
    debug!(stock_quantity = quantity, "Aggregate stock updated");

    Ok(quantity)
}

/// Overwrite a serialized product's counter with the count of its units
/// currently in stock, returning the new quantity.
///
/// Called once per line item after its whole unit batch has been
/// transitioned, never per unit.
#[instrument(skip(conn, product), fields(product_id = %product.product_id))]
pub async fn recompute_aggregate_from_units(
    conn: &mut PgConnection,
    product: &Product,
) -> Result<i64, AppError> {
    if !product.is_serialized {
        return Err(AppError::InvalidProductState(format!(
            "Product {} is not serialized; refusing to overwrite its stock counter",
            product.product_id
        )));
    }

    let timer = DB_QUERY_DURATION
        .with_label_values(&["recompute_aggregate_from_units"])
        .start_timer();

    let quantity: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE products
        SET stock_quantity = (
                SELECT COUNT(*) FROM product_units
                WHERE product_id = $1 AND status = 'in_stock'
            ),
            updated_utc = NOW()
        WHERE product_id = $1
        RETURNING stock_quantity
        "#,
    )
    .bind(product.product_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to recompute stock: {}", e)))?;

    timer.observe_duration();

    let quantity = quantity.ok_or(AppError::ProductNotFound(product.product_id))?;
    debug!(stock_quantity = quantity, "Aggregate recomputed from units");

    Ok(quantity)
}

/// Move a unit to `new_status` and point it at the line item that moved it.
///
/// One statement clears all six link columns and sets the one named by
/// `link`, which both enforces their mutual exclusivity and makes the
/// transition idempotent: repeating it with identical arguments leaves the
/// row in the identical state.
#[instrument(
    skip(conn),
    fields(product_id = %product_id, serial = %serial_number, status = %new_status, link = %link)
)]
pub async fn transition_unit(
    conn: &mut PgConnection,
    product_id: Uuid,
    serial_number: &str,
    new_status: UnitStatus,
    link: LinkKind,
    line_id: Uuid,
    actor_id: Uuid,
) -> Result<ProductUnit, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["transition_unit"])
        .start_timer();

    let unit = sqlx::query_as::<_, ProductUnit>(
        r#"
        UPDATE product_units
        SET status = $3,
            purchase_line_id        = CASE WHEN $4::varchar = 'purchase'        THEN $5 END,
            sale_line_id            = CASE WHEN $4 = 'sale'                     THEN $5 END,
            customer_return_line_id = CASE WHEN $4 = 'customer_return'          THEN $5 END,
            supplier_return_line_id = CASE WHEN $4 = 'supplier_return'          THEN $5 END,
            adjustment_in_line_id   = CASE WHEN $4 = 'adjustment_in'            THEN $5 END,
            adjustment_out_line_id  = CASE WHEN $4 = 'adjustment_out'           THEN $5 END,
            updated_by = $6,
            updated_utc = NOW()
        WHERE product_id = $1 AND serial_number = $2
        RETURNING unit_id, product_id, serial_number, status,
            purchase_line_id, sale_line_id, customer_return_line_id,
            supplier_return_line_id, adjustment_in_line_id, adjustment_out_line_id,
            updated_by, created_utc, updated_utc
        "#,
    )
    .bind(product_id)
    .bind(serial_number)
    .bind(new_status.as_str())
    .bind(link.as_str())
    .bind(line_id)
    .bind(actor_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to transition unit: {}", e)))?;

    timer.observe_duration();

    let unit = unit.ok_or_else(|| AppError::UnitNotFound {
        product_id,
        serial: serial_number.to_string(),
    })?;

    UNITS_TRANSITIONED_TOTAL
        .with_label_values(&[new_status.as_str()])
        .inc();
    debug!(unit_id = %unit.unit_id, line_id = %line_id, "Unit transitioned");

    Ok(unit)
}
