//! Observability for Stoa.
//!
//! - **Logging**: structured JSON (or pretty) output via `tracing-subscriber`
//! - **Metrics**: Prometheus-format metrics via the `metrics` crate
//!
//! Stages record through the `tracing` and `metrics` facades; this crate only
//! installs the global subscriber and recorder, once, at startup.
//!
//! # Example
//!
//! ```rust,ignore
//! use stoa_telemetry::{init_telemetry, LogConfig, MetricsConfig, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     init_telemetry(&TelemetryConfig {
//!         logging: LogConfig::default(),
//!         metrics: MetricsConfig::default(),
//!     })?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/stoa-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{fields, init_logging, LogConfig};
pub use crate::metrics::{init_metrics, render_metrics, InFlightGuard, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Configuration for all telemetry subsystems.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Logging configuration.
    pub logging: LogConfig,

    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

/// Initializes logging, then metrics.
///
/// Metrics require a running Tokio runtime when enabled.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}
