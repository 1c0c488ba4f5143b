//! Telemetry errors.

use thiserror::Error;

/// Why logging or metrics could not be set up.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The log filter directive does not parse.
    #[error("invalid log filter '{directive}': {message}")]
    InvalidFilter {
        /// Directive as configured.
        directive: String,
        /// Parser message.
        message: String,
    },

    /// A global subscriber was already installed.
    #[error("logging already initialized: {0}")]
    SubscriberInstalled(String),

    /// The metrics scrape address does not parse.
    #[error("invalid metrics address {0}")]
    InvalidAddress(String),

    /// The Prometheus recorder could not be installed.
    #[error("metrics recorder: {0}")]
    MetricsInit(String),
}
