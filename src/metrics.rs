//! Observability metrics for bulk listing
//!
//! Tracks bulk calls, throttle waits, connection retries and emitted items.
//!
//! ## Architecture
//!
//! - Uses the `metrics` crate facade; recording is a no-op until a recorder is installed
//! - [`init_metrics`] installs a Prometheus exporter with a scrape endpoint
//! - Every helper also logs through `tracing`

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<RwLock<bool>> = Lazy::new(|| RwLock::new(false));

/// Correlation ID generator for bulk call tracing
static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: later calls are no-ops.
///
/// # Arguments
/// * `addr` - Socket address to bind the Prometheus scrape endpoint (e.g., "0.0.0.0:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "bulk_requests_total",
        Unit::Count,
        "Total number of bulk calls sent to the remote API"
    );

    describe_counter!(
        "bulk_request_errors_total",
        Unit::Count,
        "Total number of failed bulk calls"
    );

    describe_histogram!(
        "bulk_request_duration_seconds",
        Unit::Seconds,
        "Bulk call duration in seconds"
    );

    describe_counter!(
        "throttle_waits_total",
        Unit::Count,
        "Number of times a caller slept because the per-second request budget was spent"
    );

    describe_counter!(
        "connect_retries_total",
        Unit::Count,
        "Total number of connection retry sleeps"
    );

    describe_histogram!(
        "connect_retry_delay_seconds",
        Unit::Seconds,
        "Delay slept before a connection retry"
    );

    describe_counter!(
        "items_emitted_total",
        Unit::Count,
        "Records delivered to listing consumers"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Generate a new correlation ID for bulk call tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("bulk-{:08x}", id)
}

/// Timing and outcome of one bulk call
pub struct BulkRequestMetrics {
    method: String,
    sub_requests: usize,
    start_time: Instant,
    correlation_id: String,
}

impl BulkRequestMetrics {
    /// Start recording a bulk call of `sub_requests` entries
    pub fn start(method: impl Into<String>, sub_requests: usize) -> Self {
        let method = method.into();
        let correlation_id = generate_correlation_id();

        debug!(
            correlation_id = %correlation_id,
            method = %method,
            sub_requests = sub_requests,
            "Sending bulk request"
        );

        Self {
            method,
            sub_requests,
            start_time: Instant::now(),
            correlation_id,
        }
    }

    /// Record a successful bulk call
    pub fn record_complete(&self) {
        let duration = self.start_time.elapsed();

        counter!(
            "bulk_requests_total",
            "method" => self.method.clone(),
            "outcome" => "ok",
        )
        .increment(1);

        histogram!(
            "bulk_request_duration_seconds",
            "method" => self.method.clone(),
        )
        .record(duration.as_secs_f64());

        debug!(
            correlation_id = %self.correlation_id,
            method = %self.method,
            sub_requests = self.sub_requests,
            duration_ms = duration.as_millis(),
            "Bulk request completed"
        );
    }

    /// Record a failed bulk call
    pub fn record_failure(&self, error: &str) {
        let duration = self.start_time.elapsed();

        counter!(
            "bulk_requests_total",
            "method" => self.method.clone(),
            "outcome" => "error",
        )
        .increment(1);

        counter!(
            "bulk_request_errors_total",
            "method" => self.method.clone(),
        )
        .increment(1);

        histogram!(
            "bulk_request_duration_seconds",
            "method" => self.method.clone(),
        )
        .record(duration.as_secs_f64());

        warn!(
            correlation_id = %self.correlation_id,
            method = %self.method,
            sub_requests = self.sub_requests,
            duration_ms = duration.as_millis(),
            error = %error,
            "Bulk request failed"
        );
    }

    /// Get the correlation ID for this call
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record a throttle wait
pub fn record_throttle_wait(duration: Duration) {
    counter!("throttle_waits_total").increment(1);

    debug!(
        wait_ms = duration.as_millis(),
        "Request budget spent, waiting for the next second"
    );
}

/// Record the delay slept before a connection retry
pub fn record_connect_retry(delay: Duration, attempt: u32) {
    counter!(
        "connect_retries_total",
        "attempt" => attempt.to_string(),
    )
    .increment(1);

    histogram!("connect_retry_delay_seconds").record(delay.as_secs_f64());

    debug!(
        attempt = attempt,
        delay_ms = delay.as_millis(),
        "Connection retry backoff recorded"
    );
}

/// Record records delivered to a consumer
pub fn record_items_emitted(count: u64) {
    if count > 0 {
        counter!("items_emitted_total").increment(count);
    }
}
