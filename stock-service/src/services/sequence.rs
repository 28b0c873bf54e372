//! Document number generation.
//!
//! Numbers come from a per-type counter row locked with `SELECT ... FOR
//! UPDATE`: concurrent callers block on the row and leave with distinct,
//! contiguous numbers. When the increment runs inside a caller's transaction
//! (`next_number_in`), a rollback releases the number for reuse, so committed
//! documents stay gap-free under normal operation.

use crate::models::Sequence;
use crate::services::metrics::{DB_QUERY_DURATION, SEQUENCE_NUMBERS_TOTAL};
use inventory_core::error::AppError;
use sqlx::postgres::PgPool;
use sqlx::PgConnection;
use tracing::{debug, instrument};

/// Reserve the next number for `sequence_type` in a transaction of its own.
#[instrument(skip(pool))]
pub async fn next_number(pool: &PgPool, sequence_type: &str) -> Result<String, AppError> {
    let mut tx = pool.begin().await.map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
    })?;

    let number = next_number_in(&mut *tx, sequence_type).await?;

    tx.commit().await.map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
    })?;

    Ok(number)
}

/// Reserve the next number for `sequence_type` on the caller's connection.
///
/// Blocks until the sequence row lock is granted. The increment commits or
/// rolls back with the caller's unit of work.
#[instrument(skip(conn))]
pub async fn next_number_in(
    conn: &mut PgConnection,
    sequence_type: &str,
) -> Result<String, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["next_number"])
        .start_timer();

    let sequence = sqlx::query_as::<_, Sequence>(
        r#"
        SELECT sequence_type, prefix, last_number, updated_utc
        FROM sequences
        WHERE sequence_type = $1
        FOR UPDATE
        "#,
    )
    .bind(sequence_type)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock sequence: {}", e)))?
    .ok_or_else(|| AppError::SequenceNotFound(sequence_type.to_string()))?;

    let next = sequence.last_number + 1;

    sqlx::query(
        r#"
        UPDATE sequences
        SET last_number = $2, updated_utc = NOW()
        WHERE sequence_type = $1
        "#,
    )
    .bind(sequence_type)
    .bind(next)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to advance sequence: {}", e)))?;

    timer.observe_duration();

    let number = format_number(&sequence.prefix, next);
    SEQUENCE_NUMBERS_TOTAL
        .with_label_values(&[sequence_type])
        .inc();
    debug!(sequence_type, number = %number, "Document number reserved");

    Ok(number)
}

/// Format a document number: prefix plus the value zero-padded to six
/// digits. Values past 999999 widen without truncation.
pub fn format_number(prefix: &str, number: i64) -> String {
    format!("{}{:06}", prefix, number)
}
