//! Ingestion metrics
//!
//! Counters and histograms are emitted through the `metrics` facade and are
//! no-ops until [`init_metrics`] installs the Prometheus exporter, so library
//! callers pay nothing unless the binary opts in with `--metrics-addr`.
//!
//! ## Emitted series
//!
//! - `http_requests_total{resource,status}`
//! - `http_429_total{resource}`
//! - `http_retries_total{resource,reason}`
//! - `http_transport_errors_total{resource}`
//! - `rate_limit_wait_seconds`
//! - `meetings_failed_total`
//! - `feature_rows_written_total{artifact}`

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info};

static METRICS_ADDR: OnceCell<SocketAddr> = OnceCell::new();

/// Metrics exporter errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The exporter could not be installed
    #[error("failed to install Prometheus exporter on {addr}: {reason}")]
    Install {
        /// Requested listen address
        addr: SocketAddr,
        /// Underlying failure
        reason: String,
    },
}

/// Install the Prometheus scrape endpoint on `addr`
///
/// Idempotent: a second call is a no-op and keeps the first address.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    if let Some(existing) = METRICS_ADDR.get() {
        debug!(addr = %existing, "Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Install {
            addr,
            reason: e.to_string(),
        })?;

    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "HTTP responses received from OpenF1, by resource and status"
    );
    describe_counter!(
        "http_429_total",
        Unit::Count,
        "Responses throttled with HTTP 429"
    );
    describe_counter!(
        "http_retries_total",
        Unit::Count,
        "Retry attempts scheduled by the resilient fetcher"
    );
    describe_counter!(
        "http_transport_errors_total",
        Unit::Count,
        "Requests that failed before a response arrived"
    );
    describe_histogram!(
        "rate_limit_wait_seconds",
        Unit::Seconds,
        "Time spent waiting for the shared rate limiter"
    );
    describe_counter!(
        "meetings_failed_total",
        Unit::Count,
        "Meetings skipped because an upstream fetch failed"
    );
    describe_counter!(
        "feature_rows_written_total",
        Unit::Count,
        "Feature rows persisted, by artifact"
    );

    let _ = METRICS_ADDR.set(addr);
    info!(addr = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Whether the exporter has been installed
pub fn is_initialized() -> bool {
    METRICS_ADDR.get().is_some()
}

/// Record a received HTTP response
pub fn record_response(resource: &str, status: u16) {
    counter!(
        "http_requests_total",
        "resource" => resource.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);

    if status == 429 {
        counter!("http_429_total", "resource" => resource.to_string()).increment(1);
    }
}

/// Record a request that failed without a response
pub fn record_transport_error(resource: &str) {
    counter!(
        "http_transport_errors_total",
        "resource" => resource.to_string(),
    )
    .increment(1);
}

/// Record a scheduled retry and its backoff
pub fn record_retry(resource: &str, reason: &'static str, backoff: Duration) {
    counter!(
        "http_retries_total",
        "resource" => resource.to_string(),
        "reason" => reason,
    )
    .increment(1);

    debug!(
        resource = resource,
        reason = reason,
        backoff_ms = backoff.as_millis() as u64,
        "Retry scheduled"
    );
}

/// Record time spent in the rate limiter
pub fn record_rate_limit_wait(waited: Duration) {
    histogram!("rate_limit_wait_seconds").record(waited.as_secs_f64());
}

/// Record a meeting dropped from a build
pub fn record_meeting_failed() {
    counter!("meetings_failed_total").increment(1);
}

/// Record rows persisted to an artifact
pub fn record_rows_written(artifact: &'static str, rows: usize) {
    counter!("feature_rows_written_total", "artifact" => artifact).increment(rows as u64);
}
