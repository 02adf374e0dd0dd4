//! Metrics module
//!
//! Provides Prometheus metrics for multipart uploads.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};

lazy_static! {
    // Multipart metrics
    pub static ref MULTIPART_UPLOADS: CounterVec = register_counter_vec!(
        "mizuchi_multipart_uploads_total",
        "Total multipart uploads",
        &["status", "phase"]
    ).unwrap();

    pub static ref MULTIPART_PARTS: Histogram = register_histogram!(
        "mizuchi_multipart_parts",
        "Number of parts per committed multipart upload",
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 10000.0]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "mizuchi_upload_bytes_total",
        "Total bytes of committed uploads"
    ).unwrap();

    // Part metrics
    pub static ref PARTS_TOTAL: CounterVec = register_counter_vec!(
        "mizuchi_parts_total",
        "Part transfers by outcome",
        &["status"]
    ).unwrap();

    pub static ref PART_BYTES_TOTAL: Counter = register_counter!(
        "mizuchi_part_bytes_total",
        "Bytes transferred in successful parts"
    ).unwrap();

    pub static ref PART_DURATION: Histogram = register_histogram!(
        "mizuchi_part_duration_seconds",
        "Part transfer duration in seconds, including retries",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]
    ).unwrap();

    pub static ref PART_RETRIES: Counter = register_counter!(
        "mizuchi_part_retries_total",
        "Part transfer attempts repeated after a transient failure"
    ).unwrap();

    // Session cleanup
    pub static ref ABORTS_TOTAL: CounterVec = register_counter_vec!(
        "mizuchi_multipart_aborts_total",
        "AbortMultipartUpload calls by outcome",
        &["status"]
    ).unwrap();
}

fn status_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

/// Record a committed multipart upload
pub fn record_multipart_upload_success(parts_count: usize, bytes: u64) {
    MULTIPART_UPLOADS
        .with_label_values(&["success", "commit"])
        .inc();
    MULTIPART_PARTS.observe(parts_count as f64);
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed multipart upload and the phase it failed in
pub fn record_multipart_upload_failure(phase: &str) {
    MULTIPART_UPLOADS
        .with_label_values(&["failure", phase])
        .inc();
}

/// Record a successful part transfer
pub fn record_part_success(bytes: u64, duration_secs: f64) {
    PARTS_TOTAL.with_label_values(&["success"]).inc();
    PART_BYTES_TOTAL.inc_by(bytes as f64);
    PART_DURATION.observe(duration_secs);
}

/// Record a part that failed for good
pub fn record_part_failure() {
    PARTS_TOTAL.with_label_values(&["failure"]).inc();
}

/// Record one retried part attempt
pub fn record_part_retry() {
    PART_RETRIES.inc();
}

/// Record an abort of an open session
pub fn record_abort(success: bool) {
    ABORTS_TOTAL.with_label_values(&[status_label(success)]).inc();
}

/// Render the default registry in the Prometheus text exposition format
pub fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
