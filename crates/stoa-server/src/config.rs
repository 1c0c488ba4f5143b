//! Listener settings.
//!
//! [`ServerSettings`] is the subset of [`StoaConfig`] the accept loop needs,
//! resolved into concrete types once at startup.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use stoa_server::ServerSettings;
//!
//! let settings = ServerSettings::builder()
//!     .addr("127.0.0.1:3000".parse().unwrap())
//!     .shutdown_timeout(Duration::from_secs(5))
//!     .build();
//!
//! assert_eq!(settings.addr().port(), 3000);
//! assert_eq!(settings.max_body_bytes(), 100 * 1024);
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use stoa_config::StoaConfig;

use crate::ServerError;

/// Default port, matching `server.port`.
pub const DEFAULT_PORT: u16 = 5000;

/// Default graceful shutdown timeout.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default deadline for receiving a request body.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default body size limit.
pub const DEFAULT_MAX_BODY_BYTES: usize = 100 * 1024;

/// Resolved settings for the HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    addr: SocketAddr,
    shutdown_timeout: Duration,
    request_timeout: Duration,
    max_body_bytes: usize,
}

impl ServerSettings {
    /// Creates a settings builder.
    #[must_use]
    pub fn builder() -> ServerSettingsBuilder {
        ServerSettingsBuilder::default()
    }

    /// Resolves settings from the application configuration.
    pub fn from_config(config: &StoaConfig) -> Result<Self, ServerError> {
        Ok(Self {
            addr: config.bind_addr()?,
            shutdown_timeout: Duration::from_secs(config.server.shutdown_timeout_secs),
            request_timeout: Duration::from_millis(config.server.request_timeout_ms),
            max_body_bytes: config.server.max_body_bytes,
        })
    }

    /// Returns the bind address.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns how long shutdown waits for in-flight connections.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Returns the deadline for receiving a request body.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the largest body the server will collect.
    #[must_use]
    pub const fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ServerSettings`].
#[derive(Debug, Clone)]
pub struct ServerSettingsBuilder {
    addr: SocketAddr,
    shutdown_timeout: Duration,
    request_timeout: Duration,
    max_body_bytes: usize,
}

impl Default for ServerSettingsBuilder {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServerSettingsBuilder {
    /// Sets the bind address.
    #[must_use]
    pub const fn addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Sets the graceful shutdown timeout.
    #[must_use]
    pub const fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets the body receive deadline.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the body size limit.
    #[must_use]
    pub const fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Builds the settings.
    #[must_use]
    pub const fn build(self) -> ServerSettings {
        ServerSettings {
            addr: self.addr,
            shutdown_timeout: self.shutdown_timeout,
            request_timeout: self.request_timeout,
            max_body_bytes: self.max_body_bytes,
        }
    }
}
