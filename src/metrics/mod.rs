//! Metrics module
//!
//! Provides Prometheus metrics for transfers, intake rejections and batches.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    // Transfer metrics
    pub static ref TRANSFERS_TOTAL: CounterVec = register_counter_vec!(
        "uploadr_transfers_total",
        "Total number of object transfers",
        &["bucket", "status"]  // "success", "failure", "timeout", "cancelled"
    ).unwrap();

    pub static ref TRANSFER_BYTES_TOTAL: Counter = register_counter!(
        "uploadr_transfer_bytes_total",
        "Total bytes stored"
    ).unwrap();

    pub static ref TRANSFER_DURATION: HistogramVec = register_histogram_vec!(
        "uploadr_transfer_duration_seconds",
        "Transfer duration in seconds",
        &["bucket"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 120.0]
    ).unwrap();

    // Intake metrics
    pub static ref REJECTIONS_TOTAL: CounterVec = register_counter_vec!(
        "uploadr_rejections_total",
        "Files rejected at intake",
        &["reason"]
    ).unwrap();

    // Batch metrics
    pub static ref BATCHES_TOTAL: CounterVec = register_counter_vec!(
        "uploadr_batches_total",
        "Batch commits by outcome",
        &["outcome"]
    ).unwrap();
}

/// Record a stored object
pub fn record_transfer_success(bucket: &str, bytes: u64) {
    TRANSFERS_TOTAL.with_label_values(&[bucket, "success"]).inc();
    TRANSFER_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed transfer; `status` is "failure", "timeout" or "cancelled"
pub fn record_transfer_failure(bucket: &str, status: &str) {
    TRANSFERS_TOTAL.with_label_values(&[bucket, status]).inc();
}

pub fn record_transfer_duration(bucket: &str, duration_secs: f64) {
    TRANSFER_DURATION
        .with_label_values(&[bucket])
        .observe(duration_secs);
}

pub fn record_rejection(reason: &str) {
    REJECTIONS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_batch(outcome: &str) {
    BATCHES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Render the default registry in the Prometheus text format
pub fn render() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_transfer_success() {
        record_transfer_success("test-bucket", 1024);
        record_transfer_duration("test-bucket", 0.02);
        // Just verify it doesn't panic
    }

    #[test]
    fn test_record_rejection_and_batch() {
        record_rejection("too_large");
        record_batch("partial");
        let text = render();
        assert!(text.contains("uploadr_rejections_total"));
        assert!(text.contains("uploadr_batches_total"));
    }
}
