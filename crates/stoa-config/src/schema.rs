//! Configuration schema types.
//!
//! This module defines the structure of all configuration sections. Every
//! section rejects unknown fields.

use serde::{Deserialize, Serialize};

/// HTTP server section.
///
/// # Example
///
/// ```
/// use stoa_config::ServerConfig;
///
/// let config = ServerConfig::default();
/// assert_eq!(config.port, 5000);
/// assert_eq!(config.max_body_bytes, 100 * 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Deadline for receiving the full request body, in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Show internal error messages to clients. Development only.
    #[serde(default)]
    pub expose_internal_errors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            request_timeout_ms: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
            expose_internal_errors: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_max_body_bytes() -> usize {
    100 * 1024
}

/// CORS policy section.
///
/// An empty `allowed_headers` list mirrors whatever headers a preflight asks for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Origins allowed to make cross-origin requests. `"*"` allows any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Send `Access-Control-Allow-Credentials: true` to allowed origins.
    #[serde(default = "default_true")]
    pub allow_credentials: bool,

    /// Methods allowed in preflight requests.
    #[serde(default = "default_allowed_methods")]
    pub allowed_methods: Vec<String>,

    /// Request headers allowed in preflight requests.
    #[serde(default)]
    pub allowed_headers: Vec<String>,

    /// Response headers exposed to the browser.
    #[serde(default = "default_exposed_headers")]
    pub exposed_headers: Vec<String>,

    /// Preflight cache lifetime in seconds.
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            allow_credentials: true,
            allowed_methods: default_allowed_methods(),
            allowed_headers: Vec::new(),
            exposed_headers: default_exposed_headers(),
            max_age_secs: None,
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://54.172.192.158".to_string()]
}

fn default_allowed_methods() -> Vec<String> {
    ["GET", "HEAD", "PUT", "PATCH", "POST", "DELETE"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_exposed_headers() -> Vec<String> {
    vec!["x-request-id".to_string()]
}

/// How caller credentials are verified.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMode {
    /// No provider; every request stays unauthenticated.
    #[default]
    Disabled,
    /// Verify session tokens locally with a configured key.
    Jwt,
    /// Ask a remote verification endpoint.
    Remote,
}

impl std::str::FromStr for IdentityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disabled" | "none" => Ok(Self::Disabled),
            "jwt" => Ok(Self::Jwt),
            "remote" => Ok(Self::Remote),
            other => Err(format!(
                "expected 'jwt', 'remote' or 'disabled', got '{other}'"
            )),
        }
    }
}

/// Identity provider section.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Verification mode.
    #[serde(default)]
    pub mode: IdentityMode,

    /// Verification key for `jwt` mode: a PEM public key for RS256, or the
    /// shared secret for HS256.
    #[serde(default)]
    pub jwt_key: Option<String>,

    /// Signature algorithm for `jwt` mode.
    #[serde(default = "default_jwt_algorithm")]
    pub jwt_algorithm: String,

    /// Required token issuer, if any.
    #[serde(default)]
    pub issuer: Option<String>,

    /// Accepted `azp` (authorized party) values. Empty accepts any.
    #[serde(default)]
    pub authorized_parties: Vec<String>,

    /// Secret key sent to the remote verification endpoint.
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Remote verification endpoint for `remote` mode.
    #[serde(default)]
    pub verify_url: Option<String>,

    /// Upper bound on a single verification, in milliseconds.
    #[serde(default = "default_identity_timeout")]
    pub timeout_ms: u64,

    /// Cookie checked for a session token when no bearer token is sent.
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            mode: IdentityMode::Disabled,
            jwt_key: None,
            jwt_algorithm: default_jwt_algorithm(),
            issuer: None,
            authorized_parties: Vec::new(),
            secret_key: None,
            verify_url: None,
            timeout_ms: default_identity_timeout(),
            session_cookie: default_session_cookie(),
        }
    }
}

fn redact(value: Option<&String>) -> Option<&'static str> {
    value.map(|_| "[redacted]")
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("mode", &self.mode)
            .field("jwt_key", &redact(self.jwt_key.as_ref()))
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("issuer", &self.issuer)
            .field("authorized_parties", &self.authorized_parties)
            .field("secret_key", &redact(self.secret_key.as_ref()))
            .field("verify_url", &self.verify_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("session_cookie", &self.session_cookie)
            .finish()
    }
}

fn default_jwt_algorithm() -> String {
    "RS256".to_string()
}

fn default_identity_timeout() -> u64 {
    3_000
}

fn default_session_cookie() -> String {
    "__session".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines.
    #[default]
    Json,
    /// Human-readable output.
    Pretty,
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive (`info`, `stoa=debug,hyper=warn`, ...).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Colored output for the pretty format.
    #[serde(default)]
    pub ansi_enabled: bool,

    /// Include file and line in log records.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Json,
            ansi_enabled: false,
            include_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Serve a Prometheus scrape endpoint.
    #[serde(default)]
    pub enabled: bool,

    /// Address of the scrape endpoint.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

/// Telemetry section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Service name attached to logs and metrics.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Deployment environment.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            environment: default_environment(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

fn default_service_name() -> String {
    "stoa".to_string()
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_defaults() {
        let cors = CorsConfig::default();
        assert_eq!(cors.allowed_origins, vec!["http://54.172.192.158"]);
        assert!(cors.allow_credentials);
        assert!(cors.allowed_methods.contains(&"POST".to_string()));
    }

    #[test]
    fn test_identity_mode_from_str() {
        assert_eq!("JWT".parse::<IdentityMode>().unwrap(), IdentityMode::Jwt);
        assert_eq!("remote".parse::<IdentityMode>().unwrap(), IdentityMode::Remote);
        assert_eq!("none".parse::<IdentityMode>().unwrap(), IdentityMode::Disabled);
        assert!("oauth".parse::<IdentityMode>().is_err());
    }

    #[test]
    fn test_identity_debug_redacts_secrets() {
        let config = IdentityConfig {
            jwt_key: Some("super-secret-key".to_string()),
            secret_key: Some("sk_live_abc".to_string()),
            ..Default::default()
        };

        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-key"));
        assert!(!debug.contains("sk_live_abc"));
        assert!(debug.contains("[redacted]"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<ServerConfig, _> = toml::from_str("prot = 80");
        assert!(result.is_err());
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let server: ServerConfig = toml::from_str("port = 8080").unwrap();
        assert_eq!(server.port, 8080);
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.request_timeout_ms, 30_000);
    }
}
