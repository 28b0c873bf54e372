//! Unit availability resolver: which serialized units may be attached to a
//! line item.
//!
//! Strictly read-only. A unit is eligible when its status is in the requested
//! set and no line item claims it, or when it is already linked to the line
//! being edited (so an edit form can show the units it previously picked).

use crate::models::{AvailableUnit, UnitStatus};
use crate::services::metrics::DB_QUERY_DURATION;
use inventory_core::error::AppError;
use sqlx::postgres::PgPool;
use tracing::instrument;
use uuid::Uuid;

/// List units of `product_id` eligible for a line item, ordered by serial
/// number.
#[instrument(skip(pool, statuses), fields(product_id = %product_id, status_count = statuses.len()))]
pub async fn available_units(
    pool: &PgPool,
    product_id: Uuid,
    statuses: &[UnitStatus],
    current_line_id: Option<Uuid>,
) -> Result<Vec<AvailableUnit>, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["available_units"])
        .start_timer();

    let status_strings: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();

    let units = sqlx::query_as::<_, AvailableUnit>(
        r#"
        SELECT unit_id, serial_number, status
        FROM product_units
        WHERE product_id = $1
          AND (
                (status = ANY($2)
                    AND purchase_line_id IS NULL
                    AND sale_line_id IS NULL
                    AND customer_return_line_id IS NULL
                    AND supplier_return_line_id IS NULL
                    AND adjustment_in_line_id IS NULL
                    AND adjustment_out_line_id IS NULL)
                OR ($3::uuid IS NOT NULL
                    AND (purchase_line_id = $3
                        OR sale_line_id = $3
                        OR customer_return_line_id = $3
                        OR supplier_return_line_id = $3
                        OR adjustment_in_line_id = $3
                        OR adjustment_out_line_id = $3))
              )
        ORDER BY serial_number
        "#,
    )
    .bind(product_id)
    .bind(&status_strings)
    .bind(current_line_id)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list available units: {}", e)))?;

    timer.observe_duration();

    Ok(units)
}
