//! Prometheus Metrics
//!
//! Metrics tracked:
//! - `serverfinder_pull_cycles_total` - counter of pull cycles by outcome
//! - `serverfinder_pull_cycle_duration_seconds` - histogram of pull cycle times
//! - `serverfinder_snapshot_records` - gauge of records in the current snapshot
//! - `serverfinder_records_skipped_total` - counter of undecodable records
//! - `serverfinder_push_cycles_total` - counter of lease writes by outcome

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// State containing the Prometheus handle for metrics export
#[derive(Clone)]
pub struct MetricsState {
    pub prometheus_handle: PrometheusHandle,
}

/// Install the Prometheus recorder and register metric descriptions.
pub fn init_metrics() -> Result<MetricsState, Box<dyn std::error::Error + Send + Sync>> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_metric_descriptions();

    Ok(MetricsState {
        prometheus_handle: handle,
    })
}

fn register_metric_descriptions() {
    describe_counter!(
        "serverfinder_pull_cycles_total",
        "Total number of pull cycles by outcome"
    );
    describe_histogram!(
        "serverfinder_pull_cycle_duration_seconds",
        "Duration of pull cycles in seconds"
    );
    describe_gauge!(
        "serverfinder_snapshot_records",
        "Number of records in the current snapshot"
    );
    describe_counter!(
        "serverfinder_records_skipped_total",
        "Total number of stored records that failed to decode"
    );
    describe_counter!(
        "serverfinder_push_cycles_total",
        "Total number of lease writes by outcome"
    );
}

/// Record a finished pull cycle
pub fn record_pull_cycle(outcome: &'static str, duration: Duration) {
    counter!("serverfinder_pull_cycles_total", "outcome" => outcome).increment(1);
    histogram!("serverfinder_pull_cycle_duration_seconds").record(duration.as_secs_f64());
}

/// Update the snapshot size gauge
pub fn set_snapshot_records(count: usize) {
    gauge!("serverfinder_snapshot_records").set(count as f64);
}

/// Record undecodable records from one cycle
pub fn record_skipped(count: usize) {
    if count > 0 {
        counter!("serverfinder_records_skipped_total").increment(count as u64);
    }
}

/// Record a lease write attempt
pub fn record_push(outcome: &'static str) {
    counter!("serverfinder_push_cycles_total", "outcome" => outcome).increment(1);
}
