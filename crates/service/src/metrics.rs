use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec, TextEncoder,
};

// Prometheus metrics (default registry)
pub static STORE_OPERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "petcare_store_operations_total",
        "Document store operations issued",
        &["entity", "op"]
    )
    .expect("register store_operations_total")
});

pub static STORE_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "petcare_store_errors_total",
        "Document store operations that failed",
        &["entity", "op"]
    )
    .expect("register store_errors_total")
});

pub static PROVISIONING_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "petcare_provisioning_total",
        "Schema provisioning passes completed",
        &["entity"]
    )
    .expect("register provisioning_total")
});

pub static SEARCH_ROWS_SKIPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "petcare_search_rows_skipped_total",
        "Search rows dropped because they failed to decode",
        &["entity"]
    )
    .expect("register search_rows_skipped_total")
});

pub static STORE_OP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "petcare_store_op_duration_seconds",
        "Document store operation duration in seconds",
        &["entity", "op"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("register store_op_duration")
});

/// Text exposition of the default registry.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
