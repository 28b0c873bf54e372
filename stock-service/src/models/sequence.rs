//! Document number sequence model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Named counter backing document reference numbers. `last_number` only ever
/// increases; callers lock the row while incrementing it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Sequence {
    pub sequence_type: String,
    pub prefix: String,
    pub last_number: i64,
    pub updated_utc: DateTime<Utc>,
}

/// Input for registering a new sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSequence {
    pub sequence_type: String,
    pub prefix: String,
}
