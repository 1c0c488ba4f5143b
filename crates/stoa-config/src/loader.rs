//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, `.env`, and environment variables.

use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, IdentityMode, LogFormat, StoaConfig};

/// Well-known environment variables, applied in this order.
///
/// `LOG_LEVEL` comes after `RUST_LOG` so it wins when both are set.
const STANDARD_ENV_VARS: &[&str] = &[
    "HOST",
    "PORT",
    "CORS_ORIGIN",
    "CORS_CREDENTIALS",
    "IDENTITY_MODE",
    "IDENTITY_JWT_KEY",
    "IDENTITY_SECRET_KEY",
    "IDENTITY_VERIFY_URL",
    "IDENTITY_TIMEOUT_MS",
    "RUST_LOG",
    "LOG_LEVEL",
    "LOG_FORMAT",
];

/// Configuration loader with layered approach.
///
/// Later layers override earlier ones:
/// 1. Default values (or a preset)
/// 2. Configuration file (TOML or JSON)
/// 3. `.env` file, loaded into the process environment
/// 4. Well-known environment variables (`PORT`, `CORS_ORIGIN`, ...)
/// 5. Prefixed overrides (`STOA__SECTION__KEY`)
///
/// # Example
///
/// ```no_run
/// use stoa_config::ConfigLoader;
///
/// # fn main() -> Result<(), stoa_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("stoa.toml")?
///     .with_dotenv()?
///     .with_standard_env()
///     .with_env_prefix("STOA")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: StoaConfig,
    standard_env: bool,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: StoaConfig::default(),
            standard_env: false,
            env_prefix: None,
        }
    }

    /// Start with development preset configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use stoa_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_development()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = StoaConfig::development();
        self
    }

    /// Start with production preset configuration.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = StoaConfig::production();
        self
    }

    /// Load configuration from a file.
    ///
    /// The format (TOML or JSON) is chosen by the file extension. The file
    /// replaces the current configuration; omitted fields take their defaults.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::no_such_file(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::unreadable(path, e))?;
        self.config = Self::parse_file(&content, path)?;

        Ok(self)
    }

    /// Load configuration from a file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in the given format (`toml` or `json`).
    ///
    /// # Example
    ///
    /// ```
    /// use stoa_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [server]
    ///     port = 8080
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.server.port, 8080);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::invalid_value(
                    "format",
                    format!("unsupported configuration format: {format}"),
                ))
            }
        };
        Ok(self)
    }

    /// Load a `.env` file from the working directory into the process
    /// environment. A missing file is not an error.
    ///
    /// Variables already set in the environment are not overwritten.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::Dotenv(e)),
        }
    }

    /// Apply the well-known environment variables at load time.
    #[must_use]
    pub fn with_standard_env(mut self) -> Self {
        self.standard_env = true;
        self
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Environment variables use the format `PREFIX__SECTION__KEY`, e.g.
    /// `STOA__SERVER__MAX_BODY_BYTES=1048576`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Finalize and return the loaded configuration.
    ///
    /// Applies environment variables (if enabled) and validates the result.
    pub fn load(mut self) -> Result<StoaConfig, ConfigError> {
        if self.standard_env {
            for name in STANDARD_ENV_VARS {
                if let Ok(value) = env::var(name) {
                    self.apply_standard_var(name, &value)?;
                }
            }
        }

        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Finalize without validation.
    #[must_use]
    pub fn load_unvalidated(self) -> StoaConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<StoaConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::invalid_value(
                "file",
                format!("unsupported configuration file format: {}", path.display()),
            )),
        }
    }

    fn apply_standard_var(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "HOST" => self.config.server.host = value.to_string(),
            "PORT" => {
                self.config.server.port = value
                    .parse()
                    .map_err(|_| ConfigError::bad_env(key, "expected a port number"))?;
            }
            "CORS_ORIGIN" => self.config.cors.allowed_origins = parse_list(value),
            "CORS_CREDENTIALS" => {
                self.config.cors.allow_credentials = parse_bool(value)
                    .ok_or_else(|| ConfigError::bad_env(key, "expected boolean"))?;
            }
            "IDENTITY_MODE" => {
                self.config.identity.mode = value
                    .parse::<IdentityMode>()
                    .map_err(|reason| ConfigError::bad_env(key, reason))?;
            }
            "IDENTITY_JWT_KEY" => self.config.identity.jwt_key = non_empty(value),
            "IDENTITY_SECRET_KEY" => self.config.identity.secret_key = non_empty(value),
            "IDENTITY_VERIFY_URL" => self.config.identity.verify_url = non_empty(value),
            "IDENTITY_TIMEOUT_MS" => {
                self.config.identity.timeout_ms = value
                    .parse()
                    .map_err(|_| ConfigError::bad_env(key, "expected integer"))?;
            }
            "RUST_LOG" | "LOG_LEVEL" => {
                if !value.trim().is_empty() {
                    self.config.telemetry.logging.level = value.to_string();
                }
            }
            "LOG_FORMAT" => self.config.telemetry.logging.format = parse_log_format(key, value)?,
            _ => {}
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let mut overrides: Vec<(String, String)> = env::vars()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect();
        overrides.sort();

        for (key, value) in overrides {
            self.apply_env_var(&key, &value, prefix)?;
        }

        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(key_without_prefix) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__"))
        else {
            return Ok(());
        };

        let parts: Vec<&str> = key_without_prefix.split("__").collect();

        match parts.as_slice() {
            // Server section
            ["SERVER", "HOST"] => self.config.server.host = value.to_string(),
            ["SERVER", "PORT"] => {
                self.config.server.port = value
                    .parse()
                    .map_err(|_| ConfigError::bad_env(key, "expected a port number"))?;
            }
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                self.config.server.shutdown_timeout_secs = parse_int(key, value)?;
            }
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                self.config.server.request_timeout_ms = parse_int(key, value)?;
            }
            ["SERVER", "MAX_BODY_BYTES"] => {
                self.config.server.max_body_bytes = value
                    .parse()
                    .map_err(|_| ConfigError::bad_env(key, "expected integer"))?;
            }
            ["SERVER", "EXPOSE_INTERNAL_ERRORS"] => {
                self.config.server.expose_internal_errors = parse_bool(value)
                    .ok_or_else(|| ConfigError::bad_env(key, "expected boolean"))?;
            }

            // CORS section
            ["CORS", "ALLOWED_ORIGINS"] => self.config.cors.allowed_origins = parse_list(value),
            ["CORS", "ALLOW_CREDENTIALS"] => {
                self.config.cors.allow_credentials = parse_bool(value)
                    .ok_or_else(|| ConfigError::bad_env(key, "expected boolean"))?;
            }
            ["CORS", "ALLOWED_METHODS"] => self.config.cors.allowed_methods = parse_list(value),
            ["CORS", "ALLOWED_HEADERS"] => self.config.cors.allowed_headers = parse_list(value),
            ["CORS", "EXPOSED_HEADERS"] => self.config.cors.exposed_headers = parse_list(value),
            ["CORS", "MAX_AGE_SECS"] => {
                self.config.cors.max_age_secs = if value.is_empty() {
                    None
                } else {
                    Some(parse_int(key, value)?)
                };
            }

            // Identity section
            ["IDENTITY", "MODE"] => {
                self.config.identity.mode = value
                    .parse::<IdentityMode>()
                    .map_err(|reason| ConfigError::bad_env(key, reason))?;
            }
            ["IDENTITY", "JWT_KEY"] => self.config.identity.jwt_key = non_empty(value),
            ["IDENTITY", "JWT_ALGORITHM"] => {
                self.config.identity.jwt_algorithm = value.to_string();
            }
            ["IDENTITY", "ISSUER"] => self.config.identity.issuer = non_empty(value),
            ["IDENTITY", "AUTHORIZED_PARTIES"] => {
                self.config.identity.authorized_parties = parse_list(value);
            }
            ["IDENTITY", "SECRET_KEY"] => self.config.identity.secret_key = non_empty(value),
            ["IDENTITY", "VERIFY_URL"] => self.config.identity.verify_url = non_empty(value),
            ["IDENTITY", "TIMEOUT_MS"] => {
                self.config.identity.timeout_ms = parse_int(key, value)?;
            }
            ["IDENTITY", "SESSION_COOKIE"] => {
                self.config.identity.session_cookie = value.to_string();
            }

            // Telemetry section
            ["TELEMETRY", "SERVICE_NAME"] => {
                self.config.telemetry.service_name = value.to_string();
            }
            ["TELEMETRY", "ENVIRONMENT"] => {
                self.config.telemetry.environment = value.to_string();
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => {
                self.config.telemetry.logging.level = value.to_string();
            }
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                self.config.telemetry.logging.format = parse_log_format(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "ANSI_ENABLED"] => {
                self.config.telemetry.logging.ansi_enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::bad_env(key, "expected boolean"))?;
            }
            ["TELEMETRY", "METRICS", "ENABLED"] => {
                self.config.telemetry.metrics.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::bad_env(key, "expected boolean"))?;
            }
            ["TELEMETRY", "METRICS", "ADDR"] => {
                self.config.telemetry.metrics.addr = value.to_string();
            }

            // Unknown key - ignore
            _ => {}
        }

        Ok(())
    }
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_int(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::bad_env(key, "expected integer"))
}

fn parse_log_format(key: &str, value: &str) -> Result<LogFormat, ConfigError> {
    match value.to_lowercase().as_str() {
        "json" => Ok(LogFormat::Json),
        "pretty" => Ok(LogFormat::Pretty),
        _ => Err(ConfigError::bad_env(
            key,
            "expected 'json' or 'pretty'",
        )),
    }
}

/// Split a comma-separated list, dropping empty entries.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.cors.allowed_origins, vec!["http://54.172.192.158"]);
    }

    #[test]
    fn test_loader_with_development() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(config.telemetry.logging.level, "debug");
        assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_loader_with_production() {
        let config = ConfigLoader::new().with_production().load().unwrap();
        assert_eq!(config.telemetry.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"server": {"port": 3000}, "cors": {"allow_credentials": false}}"#;

        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.server.port, 3000);
        assert!(!config.cors.allow_credentials);
    }

    #[test]
    fn test_loader_rejects_unknown_section() {
        let result = ConfigLoader::new().with_string("[database]\nurl = \"x\"", "toml");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_loader_rejects_unknown_format() {
        assert!(ConfigLoader::new().with_string("", "yaml").is_err());
    }

    #[test]
    fn test_loader_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stoa.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
            [server]
            port = 7000
            max_body_bytes = 2048

            [identity]
            mode = "jwt"
            jwt_key = "dev-secret"
            jwt_algorithm = "HS256"
            "#
        )
        .unwrap();

        let config = ConfigLoader::new().with_file(&path).unwrap().load().unwrap();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.max_body_bytes, 2048);
        assert_eq!(config.identity.mode, IdentityMode::Jwt);
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/stoa.toml");
        assert!(matches!(result, Err(ConfigError::NoSuchFile(_))));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/stoa.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_load_validates() {
        let result = ConfigLoader::new()
            .with_string("[identity]\nmode = \"remote\"", "toml")
            .unwrap()
            .load();
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));

        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));

        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list("http://a.example, http://b.example,,"),
            vec!["http://a.example", "http://b.example"]
        );
        assert!(parse_list("").is_empty());
    }

    // The process environment is shared by parallel tests; exercise the
    // appliers directly instead of calling set_var.

    #[test]
    fn test_apply_standard_vars() {
        let mut loader = ConfigLoader::new();
        loader.apply_standard_var("PORT", "8081").unwrap();
        loader
            .apply_standard_var("CORS_ORIGIN", "https://app.example.com,https://admin.example.com")
            .unwrap();
        loader.apply_standard_var("CORS_CREDENTIALS", "false").unwrap();
        loader.apply_standard_var("IDENTITY_MODE", "jwt").unwrap();
        loader.apply_standard_var("IDENTITY_JWT_KEY", "k").unwrap();

        let config = loader.load_unvalidated();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.cors.allowed_origins.len(), 2);
        assert!(!config.cors.allow_credentials);
        assert_eq!(config.identity.mode, IdentityMode::Jwt);
        assert_eq!(config.identity.jwt_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_apply_standard_var_invalid_port() {
        let mut loader = ConfigLoader::new();
        assert!(loader.apply_standard_var("PORT", "70000").is_err());
        assert!(loader.apply_standard_var("PORT", "http").is_err());
    }

    #[test]
    fn test_log_level_precedence() {
        let mut loader = ConfigLoader::new();
        loader.apply_standard_var("RUST_LOG", "warn").unwrap();
        loader.apply_standard_var("LOG_LEVEL", "debug").unwrap();
        assert_eq!(loader.load_unvalidated().telemetry.logging.level, "debug");
    }

    #[test]
    fn test_apply_env_var_sections() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__SERVER__MAX_BODY_BYTES", "1048576", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__CORS__EXPOSED_HEADERS", "x-request-id,etag", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__IDENTITY__SESSION_COOKIE", "sid", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__TELEMETRY__METRICS__ENABLED", "yes", "TEST")
            .unwrap();

        let config = loader.load_unvalidated();
        assert_eq!(config.server.max_body_bytes, 1_048_576);
        assert_eq!(config.cors.exposed_headers, vec!["x-request-id", "etag"]);
        assert_eq!(config.identity.session_cookie, "sid");
        assert!(config.telemetry.metrics.enabled);
    }

    #[test]
    fn test_apply_env_var_invalid_integer() {
        let mut loader = ConfigLoader::new();
        let result = loader.apply_env_var("TEST__SERVER__REQUEST_TIMEOUT_MS", "soon", "TEST");
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_env_var_ignores_unprefixed_and_unknown() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TESTING", "1", "TEST").unwrap();
        loader.apply_env_var("TEST__NOPE__KEY", "1", "TEST").unwrap();
        assert_eq!(loader.load_unvalidated(), StoaConfig::default());
    }

    #[test]
    fn test_apply_env_var_log_format() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__TELEMETRY__LOGGING__FORMAT", "pretty", "TEST")
            .unwrap();
        assert_eq!(
            loader.load_unvalidated().telemetry.logging.format,
            LogFormat::Pretty
        );
        let mut loader = ConfigLoader::new();
        assert!(loader
            .apply_env_var("TEST__TELEMETRY__LOGGING__FORMAT", "xml", "TEST")
            .is_err());
    }
}
