//! Server error types.

use std::net::SocketAddr;

use stoa_config::ConfigError;
use thiserror::Error;

/// Errors that stop the server from starting or running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configuration does not describe a usable listener.
    #[error("invalid server configuration: {0}")]
    Config(#[from] ConfigError),

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error on an already bound listener.
    #[error("listener I/O error: {0}")]
    Io(#[from] std::io::Error),
}
