//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Why configuration could not be loaded or failed validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("no configuration file at {}", .0.display())]
    NoSuchFile(PathBuf),

    /// The file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        /// File that was being read.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax error or unknown key.
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON syntax error or unknown key.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A `.env` file exists but could not be parsed.
    #[error(".env: {0}")]
    Dotenv(#[from] dotenvy::Error),

    /// A key holds a value the server cannot use.
    #[error("{field}: {reason}")]
    Invalid {
        /// Dotted key, e.g. `cors.allowed_origins`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A key required by the selected mode is unset.
    #[error("{field} is required")]
    Missing {
        /// Dotted key.
        field: String,
    },

    /// A well-known or prefixed environment variable did not parse.
    #[error("environment variable {var}: {reason}")]
    BadEnv {
        /// Variable name.
        var: String,
        /// What was expected.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn no_such_file(path: impl Into<PathBuf>) -> Self {
        Self::NoSuchFile(path.into())
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Unreadable {
            path: path.into(),
            source,
        }
    }

    /// Creates an [`ConfigError::Invalid`] error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a [`ConfigError::Missing`] error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::Missing {
            field: field.into(),
        }
    }

    pub(crate) fn bad_env(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadEnv {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// Returns the configuration key or variable at fault, when there is one.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Invalid { field, .. } | Self::Missing { field } => Some(field),
            Self::BadEnv { var, .. } => Some(var),
            _ => None,
        }
    }
}
