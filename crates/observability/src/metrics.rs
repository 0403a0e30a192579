//! Metrics implementation using Prometheus.

use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use mikareads_core::{Error, Result};

/// Initialize Prometheus recorder and return the handle.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::internal(format!("Failed to install Prometheus recorder: {}", e)))?;

    tracing::info!("Prometheus metrics recorder initialized");
    Ok(handle)
}

/// Count a response cache lookup.
pub fn track_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("proxy_cache_lookups_total", "result" => result).increment(1);
}

/// Count one outbound attempt and record its latency.
pub fn track_upstream(outcome: &'static str, latency: Duration) {
    metrics::counter!("upstream_requests_total", "outcome" => outcome).increment(1);
    metrics::histogram!("upstream_request_duration_seconds", "outcome" => outcome)
        .record(latency.as_secs_f64());
}

/// Count a retry caused by upstream throttling.
pub fn track_throttle_retry() {
    metrics::counter!("upstream_throttle_retries_total").increment(1);
}

/// Count a request that exceeded its client's window.
pub fn track_admission_denied(policy: &'static str) {
    metrics::counter!("admission_denied_total", "policy" => policy).increment(1);
}
