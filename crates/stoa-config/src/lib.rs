//! Typed configuration for Stoa.
//!
//! This crate provides a strongly-typed configuration system with support for:
//! - TOML and JSON configuration files
//! - `.env` files
//! - The well-known deployment variables (`PORT`, `CORS_ORIGIN`, ...)
//! - Prefixed environment overrides (`STOA__SECTION__KEY`)
//! - Strict validation (fails on unknown fields)
//!
//! The configuration is read once at startup into a [`StoaConfig`] that is
//! immutable afterwards.
//!
//! # Example
//!
//! ```no_run
//! use stoa_config::ConfigLoader;
//!
//! # fn main() -> Result<(), stoa_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("stoa.toml")?
//!     .with_dotenv()?
//!     .with_standard_env()
//!     .with_env_prefix("STOA")
//!     .load()?;
//!
//! println!("Listening on {}", config.bind_addr()?);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 5000
//! max_body_bytes = 102400
//! request_timeout_ms = 30000
//! shutdown_timeout_secs = 30
//!
//! [cors]
//! allowed_origins = ["http://54.172.192.158"]
//! allow_credentials = true
//!
//! [identity]
//! mode = "jwt"
//! jwt_algorithm = "RS256"
//! timeout_ms = 3000
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [telemetry.metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```

#![doc(html_root_url = "https://docs.rs/stoa-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::StoaConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
