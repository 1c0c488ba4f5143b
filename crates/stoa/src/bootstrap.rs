//! Startup wiring for the `stoa` binary.
//!
//! Loads the layered configuration, translates it for the telemetry crate
//! and registers the application routes.

use std::path::Path;

use http::StatusCode;
use stoa_config::{ConfigError, ConfigLoader, LogFormat, StoaConfig};
use stoa_core::{RequestContext, Response, ResponseExt, StoaResult};
use stoa_router::{require_identity, RouteError, RouteTable};
use stoa_telemetry::{LogConfig, TelemetryConfig};

/// Configuration file read from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "stoa.toml";

/// Prefix for `STOA__SECTION__KEY` overrides.
pub const ENV_PREFIX: &str = "STOA";

/// Loads configuration in layers.
///
/// Defaults, then the config file (`path`, or `stoa.toml` if present), then
/// `.env`, then the well-known variables (`PORT`, `CORS_ORIGIN`, ...), then
/// `STOA__*` overrides. The result is validated.
pub fn load_config(path: Option<&Path>) -> Result<StoaConfig, ConfigError> {
    let loader = match path {
        Some(path) => ConfigLoader::new().with_file(path)?,
        None => ConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE)?,
    };

    loader
        .with_dotenv()?
        .with_standard_env()
        .with_env_prefix(ENV_PREFIX)
        .load()
}

/// Translates the telemetry section into telemetry crate settings.
#[must_use]
pub fn telemetry_config(config: &StoaConfig) -> TelemetryConfig {
    let logging = &config.telemetry.logging;
    let metrics = &config.telemetry.metrics;

    TelemetryConfig {
        logging: LogConfig {
            level: logging.level.clone(),
            json_format: logging.format == LogFormat::Json,
            ansi: logging.ansi_enabled,
            file_line_info: logging.include_location,
            ..LogConfig::default()
        },
        metrics: stoa_telemetry::MetricsConfig {
            enabled: metrics.enabled,
            addr: metrics.addr.clone(),
            ..stoa_telemetry::MetricsConfig::default()
        },
    }
}

/// Builds the application route table.
///
/// | Method | Path      | Handler                                   |
/// |--------|-----------|-------------------------------------------|
/// | GET    | `/api/me` | The caller's identity, 401 when signed out |
pub fn routes() -> Result<RouteTable, RouteError> {
    let mut routes = RouteTable::new();
    routes.get("/api/me", |ctx| Box::pin(current_user(ctx)))?;
    Ok(routes)
}

async fn current_user(ctx: &mut RequestContext) -> StoaResult<Response> {
    let identity = require_identity(ctx)?;
    tracing::debug!(request_id = %ctx.request_id(), user = %identity.log_id(), "Serving current user");
    Ok(Response::json(StatusCode::OK, identity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_telemetry_is_json_without_metrics() {
        let telemetry = telemetry_config(&StoaConfig::default());
        assert!(telemetry.logging.json_format);
        assert_eq!(telemetry.logging.level, "info");
        assert!(!telemetry.metrics.enabled);
    }

    #[test]
    fn test_pretty_logging_and_metrics_carry_over() {
        let mut config = StoaConfig::default();
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.logging.level = "stoa=debug".to_string();
        config.telemetry.logging.ansi_enabled = true;
        config.telemetry.metrics.enabled = true;
        config.telemetry.metrics.addr = "127.0.0.1:9464".to_string();

        let telemetry = telemetry_config(&config);
        assert!(!telemetry.logging.json_format);
        assert!(telemetry.logging.ansi);
        assert_eq!(telemetry.logging.level, "stoa=debug");
        assert!(telemetry.metrics.enabled);
        assert_eq!(telemetry.metrics.addr, "127.0.0.1:9464");
        assert!(!telemetry.metrics.duration_buckets.is_empty());
    }

    #[test]
    fn test_routes_register_current_user() {
        let routes = routes().unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(
            routes.routes()[0],
            (http::Method::GET, "/api/me".to_string())
        );
    }
}
