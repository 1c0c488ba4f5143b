//! Root configuration type.
//!
//! [`StoaConfig`] is built once at startup and never mutated afterwards. It is
//! shared as an `Arc<StoaConfig>` by the pipeline and the server.

use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::{ConfigError, CorsConfig, IdentityConfig, IdentityMode, ServerConfig, TelemetrySection};

const SUPPORTED_JWT_ALGORITHMS: &[&str] = &[
    "HS256", "HS384", "HS512", "RS256", "RS384", "RS512", "ES256", "ES384",
];

/// Complete Stoa configuration.
///
/// # Example
///
/// ```
/// use stoa_config::StoaConfig;
///
/// let config = StoaConfig::default();
/// assert_eq!(config.server.port, 5000);
/// assert_eq!(config.bind_addr().unwrap().to_string(), "0.0.0.0:5000");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct StoaConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// CORS policy.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Identity provider settings.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Logging and metrics settings.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl StoaConfig {
    /// Returns the socket address the server binds.
    ///
    /// `server.host` must be an IP address literal.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.server.host.parse().map_err(|_| {
            ConfigError::invalid_value(
                "server.host",
                format!("expected an IP address, got '{}'", self.server.host),
            )
        })?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_body_bytes",
                "must be greater than zero",
            ));
        }
        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        self.validate_cors()?;
        self.validate_identity()?;

        if self.telemetry.metrics.enabled
            && self.telemetry.metrics.addr.parse::<SocketAddr>().is_err()
        {
            return Err(ConfigError::invalid_value(
                "telemetry.metrics.addr",
                format!("invalid socket address: {}", self.telemetry.metrics.addr),
            ));
        }

        Ok(())
    }

    fn validate_cors(&self) -> Result<(), ConfigError> {
        let cors = &self.cors;
        if cors.allowed_origins.is_empty() {
            return Err(ConfigError::missing_field("cors.allowed_origins"));
        }

        // Browsers refuse credentialed responses with a wildcard origin.
        if cors.allow_credentials && cors.allowed_origins.iter().any(|o| o == "*") {
            return Err(ConfigError::invalid_value(
                "cors.allowed_origins",
                "'*' cannot be combined with allow_credentials",
            ));
        }

        if let Some(method) = cors
            .allowed_methods
            .iter()
            .find(|m| http_method_is_invalid(m))
        {
            return Err(ConfigError::invalid_value(
                "cors.allowed_methods",
                format!("invalid method '{method}'"),
            ));
        }

        Ok(())
    }

    fn validate_identity(&self) -> Result<(), ConfigError> {
        let identity = &self.identity;
        if identity.timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "identity.timeout_ms",
                "must be greater than zero",
            ));
        }

        match identity.mode {
            IdentityMode::Disabled => {}
            IdentityMode::Jwt => {
                if identity.jwt_key.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::missing_field("identity.jwt_key"));
                }
                let algorithm = identity.jwt_algorithm.to_uppercase();
                if !SUPPORTED_JWT_ALGORITHMS.contains(&algorithm.as_str()) {
                    return Err(ConfigError::invalid_value(
                        "identity.jwt_algorithm",
                        format!("unsupported algorithm '{}'", identity.jwt_algorithm),
                    ));
                }
            }
            IdentityMode::Remote => {
                let url = identity
                    .verify_url
                    .as_deref()
                    .ok_or_else(|| ConfigError::missing_field("identity.verify_url"))?;
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::invalid_value(
                        "identity.verify_url",
                        "must be an http(s) URL",
                    ));
                }
                if identity.secret_key.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::missing_field("identity.secret_key"));
                }
            }
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// Pretty logs at debug level, internal error messages visible, and CORS
    /// open to the Vite dev server.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();

        config.server.host = "127.0.0.1".to_string();
        config.server.expose_internal_errors = true;

        config
            .cors
            .allowed_origins
            .push("http://localhost:5173".to_string());

        config.telemetry.environment = "development".to_string();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = crate::LogFormat::Pretty;
        config.telemetry.logging.ansi_enabled = true;
        config.telemetry.logging.include_location = true;

        config
    }

    /// Create a production configuration preset.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();

        config.server.expose_internal_errors = false;
        config.telemetry.environment = "production".to_string();
        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = crate::LogFormat::Json;
        config.telemetry.logging.ansi_enabled = false;

        config
    }
}

fn http_method_is_invalid(method: &str) -> bool {
    method.is_empty() || !method.bytes().all(|b| b.is_ascii_alphabetic())
}
