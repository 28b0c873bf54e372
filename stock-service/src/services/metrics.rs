//! Prometheus metrics for stock-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Reconciliation runs by outcome (completed, noop).
pub static RECONCILIATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "stock_reconciliations_total",
        "Total number of transaction reconciliations",
        &["outcome"]
    )
    .expect("Failed to register reconciliations_total")
});

/// Line items processed during reconciliation (applied, skipped).
pub static RECONCILED_LINES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "stock_reconciled_lines_total",
        "Total number of line items processed during reconciliation",
        &["outcome"]
    )
    .expect("Failed to register reconciled_lines_total")
});

/// Unit transitions by resulting status.
pub static UNITS_TRANSITIONED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "stock_units_transitioned_total",
        "Total number of serialized unit transitions",
        &["status"]
    )
    .expect("Failed to register units_transitioned_total")
});

/// Document numbers handed out per sequence type.
pub static SEQUENCE_NUMBERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "stock_sequence_numbers_total",
        "Total number of document numbers generated",
        &["sequence_type"]
    )
    .expect("Failed to register sequence_numbers_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "stock_errors_total",
        "Total number of errors by type",
        &["error_type"]  // db_error, reconcile, etc.
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "stock_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&RECONCILIATIONS_TOTAL);
    Lazy::force(&RECONCILED_LINES_TOTAL);
    Lazy::force(&UNITS_TRANSITIONED_TOTAL);
    Lazy::force(&SEQUENCE_NUMBERS_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
