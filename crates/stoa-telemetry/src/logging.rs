//! Structured logging.
//!
//! One global `tracing` subscriber: JSON lines by default, pretty output for
//! development, filtered by an [`EnvFilter`] directive such as
//! `info,stoa_middleware=debug`.
//!
//! ```rust,ignore
//! use stoa_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::default())?;
//! tracing::info!(request_id = %id, http.status_code = 200, "Request completed");
//! ```

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Logging settings.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Install a subscriber at all.
    pub enabled: bool,

    /// [`EnvFilter`] directive.
    pub level: String,

    /// JSON lines instead of pretty output.
    pub json_format: bool,

    /// ANSI colors. Pretty output only.
    pub ansi: bool,

    /// Source file and line on every record.
    pub file_line_info: bool,

    /// Module path on every record.
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            ansi: false,
            file_line_info: false,
            include_target: true,
        }
    }
}

impl LogConfig {
    /// Pretty, colored, debug-level output with source locations.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            ansi: true,
            file_line_info: true,
            ..Self::default()
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs the global subscriber described by `config`.
///
/// Does nothing when logging is disabled. Fails on a bad filter directive or
/// when another subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;
    tracing_subscriber::registry()
        .with(format_layer(config).with_filter(filter))
        .try_init()
        .map_err(|e| TelemetryError::SubscriberInstalled(e.to_string()))
}

fn format_layer(config: &LogConfig) -> BoxedLayer {
    let base = tracing_subscriber::fmt::layer()
        .with_file(config.file_line_info)
        .with_line_number(config.file_line_info)
        .with_target(config.include_target);

    if config.json_format {
        base.json().with_current_span(true).boxed()
    } else {
        base.pretty().with_ansi(config.ansi).boxed()
    }
}

/// Parses a filter directive.
pub fn create_env_filter(directive: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(directive).map_err(|e| TelemetryError::InvalidFilter {
        directive: directive.to_string(),
        message: e.to_string(),
    })
}

/// Field names used by the pipeline's log records.
pub mod fields {
    /// Request id, on every record emitted while a request is in flight.
    pub const REQUEST_ID: &str = "request_id";
    /// HTTP method.
    pub const HTTP_METHOD: &str = "http.method";
    /// Request path, without the query string.
    pub const HTTP_PATH: &str = "http.path";
    /// Final response status.
    pub const HTTP_STATUS: &str = "http.status_code";
    /// Wall time from accept to response, in milliseconds.
    pub const DURATION_MS: &str = "duration_ms";
    /// Stage that produced the response.
    pub const STAGE: &str = "stage";
    /// Error envelope code.
    pub const ERROR_CODE: &str = "error.code";
    /// What the auth stage concluded (`verified`, `missing`, ...).
    pub const AUTH_OUTCOME: &str = "auth.outcome";
}
