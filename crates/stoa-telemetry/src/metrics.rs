//! Prometheus metrics for Stoa.
//!
//! Recording goes through the `metrics` facade and is a no-op until
//! [`init_metrics`] installs the Prometheus recorder.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `stoa_requests_total` | Counter | `method`, `status`, `stage` | Completed requests |
//! | `stoa_request_duration_seconds` | Histogram | `method`, `stage` | Request latency |
//! | `stoa_in_flight_requests` | Gauge | - | Requests currently in the pipeline |
//! | `stoa_auth_outcomes_total` | Counter | `outcome` | Auth stage conclusions |
//! | `stoa_identity_verify_seconds` | Histogram | `provider` | Identity provider latency |

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

/// Request counter name.
pub const REQUESTS_TOTAL: &str = "stoa_requests_total";
/// Request latency histogram name.
pub const REQUEST_DURATION_SECONDS: &str = "stoa_request_duration_seconds";
/// In-flight gauge name.
pub const IN_FLIGHT_REQUESTS: &str = "stoa_in_flight_requests";
/// Auth outcome counter name.
pub const AUTH_OUTCOMES_TOTAL: &str = "stoa_auth_outcomes_total";
/// Identity provider latency histogram name.
pub const IDENTITY_VERIFY_SECONDS: &str = "stoa_identity_verify_seconds";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether the exporter is installed.
    pub enabled: bool,

    /// Address of the scrape endpoint (e.g., "0.0.0.0:9090").
    pub addr: String,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Installs the Prometheus recorder and spawns its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .build()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    let _ = METRICS_HANDLE.set(handle);

    tokio::spawn(async move {
        if let Err(e) = exporter.await {
            tracing::error!(error = ?e, "Metrics exporter stopped");
        }
    });

    register_metric_descriptions();
    tracing::info!(addr = %addr, "Prometheus metrics endpoint listening");

    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(REQUESTS_TOTAL, "Total number of HTTP requests processed");
    describe_histogram!(REQUEST_DURATION_SECONDS, "HTTP request duration in seconds");
    describe_gauge!(
        IN_FLIGHT_REQUESTS,
        "Number of HTTP requests currently in the pipeline"
    );
    describe_counter!(AUTH_OUTCOMES_TOTAL, "Auth stage conclusions by outcome");
    describe_histogram!(
        IDENTITY_VERIFY_SECONDS,
        "Identity provider verification latency in seconds"
    );
}

/// Records a completed request.
///
/// `stage` is the pipeline stage that produced the response.
pub fn record_request(method: &str, status_code: u16, stage: &str, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status_code.to_string(),
        "stage" => stage.to_string()
    )
    .increment(1);

    histogram!(
        REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "stage" => stage.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records what the auth stage concluded.
pub fn record_auth_outcome(outcome: &'static str) {
    counter!(AUTH_OUTCOMES_TOTAL, "outcome" => outcome).increment(1);
}

/// Records one identity provider call.
pub fn record_identity_verify(provider: &'static str, duration: Duration) {
    histogram!(IDENTITY_VERIFY_SECONDS, "provider" => provider).record(duration.as_secs_f64());
}

/// Guard that tracks one in-flight request.
///
/// Decrements the gauge on drop, including when the request future is
/// cancelled or panics.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Creates a new guard and increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(IN_FLIGHT_REQUESTS).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT_REQUESTS).decrement(1.0);
    }
}
