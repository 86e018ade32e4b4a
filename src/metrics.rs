//! Reaper metrics through the `metrics` facade.
//!
//! Nothing is exported from here; the embedding application installs a
//! recorder (Prometheus or otherwise) and these calls feed it.
//!
//! # Metrics Recorded
//!
//! - `sessreap_records_deleted_total` - Records removed by the reaper (labels: namespace)
//! - `sessreap_records_skipped_total` - Records kept because a pre-delete hook failed
//! - `sessreap_malformed_records_total` - Records whose value could not be decoded
//! - `sessreap_batch_errors_total` - Failed batches (labels: namespace, stage)
//! - `sessreap_batch_duration_seconds` - Batch duration histogram

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Registers all metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(
        "sessreap_records_deleted_total",
        "Expired or malformed records removed by the reaper"
    );
    describe_counter!(
        "sessreap_records_skipped_total",
        "Expired records kept because the pre-delete hook failed"
    );
    describe_counter!(
        "sessreap_malformed_records_total",
        "Stored values that could not be decoded"
    );
    describe_counter!("sessreap_batch_errors_total", "Sweep batches that failed");
    describe_histogram!(
        "sessreap_batch_duration_seconds",
        "Duration of one sweep batch in seconds"
    );
}

/// Records the outcome of a completed batch.
pub fn record_batch(namespace: &str, deleted: usize, skipped: usize, malformed: usize, elapsed: Duration) {
    let ns = namespace.to_string();
    counter!("sessreap_records_deleted_total", "namespace" => ns.clone()).increment(deleted as u64);
    counter!("sessreap_records_skipped_total", "namespace" => ns.clone()).increment(skipped as u64);
    counter!("sessreap_malformed_records_total", "namespace" => ns.clone())
        .increment(malformed as u64);
    histogram!("sessreap_batch_duration_seconds", "namespace" => ns).record(elapsed.as_secs_f64());
}

/// Records a failed batch.
pub fn record_batch_error(namespace: &str, stage: &'static str) {
    counter!(
        "sessreap_batch_errors_total",
        "namespace" => namespace.to_string(),
        "stage" => stage
    )
    .increment(1);
}
