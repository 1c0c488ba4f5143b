//! Error types for Stoa.
//!
//! [`StoaError`] is the only error type a pipeline stage may signal. The error
//! handler stage is the single place that turns one into a client-visible
//! response, via [`StoaError::to_envelope`].
//!
//! Failures of the identity provider are deliberately absent here: an
//! unreachable provider leaves the request unauthenticated instead of failing it.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`StoaError`].
pub type StoaResult<T> = Result<T, StoaError>;

/// Message used in place of internal error details.
const REDACTED_MESSAGE: &str = "An internal error occurred";

/// Categories of errors for classification and status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The request body could not be decoded.
    MalformedInput,
    /// The request body exceeded the configured limit.
    PayloadTooLarge,
    /// The request violated the CORS policy.
    PolicyRejected,
    /// A handler required an identity that was not attached.
    Unauthenticated,
    /// No route matched.
    NotFound,
    /// The request did not complete in time.
    Timeout,
    /// Any other failure from routing or business logic.
    Unhandled,
}

impl ErrorCategory {
    /// Returns the HTTP status code for this category.
    #[must_use]
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::MalformedInput => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::PolicyRejected => StatusCode::FORBIDDEN,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Unhandled => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the machine-readable error code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MalformedInput => "MALFORMED_INPUT",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::PolicyRejected => "CORS_REJECTED",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::NotFound => "NOT_FOUND",
            Self::Timeout => "TIMEOUT",
            Self::Unhandled => "INTERNAL_ERROR",
        }
    }
}

/// Standard error type signalled by pipeline stages and route handlers.
///
/// # Example
///
/// ```
/// use stoa_core::{StoaError, ErrorCategory};
///
/// let error = StoaError::not_found("GET", "/missing");
/// assert_eq!(error.category(), ErrorCategory::NotFound);
/// assert_eq!(error.status_code(), http::StatusCode::NOT_FOUND);
/// ```
#[derive(Error, Debug)]
pub enum StoaError {
    /// The body declared a structured type but failed to decode.
    #[error("Malformed request body: {message}")]
    MalformedInput {
        /// Decoder message (safe to show the client).
        message: String,
    },

    /// The body exceeded the configured size limit.
    #[error("Request body exceeds the {limit} byte limit")]
    PayloadTooLarge {
        /// The configured limit in bytes.
        limit: usize,
    },

    /// The request violated the CORS policy.
    #[error("Rejected by CORS policy: {reason}")]
    PolicyRejected {
        /// Which rule rejected the request.
        reason: String,
    },

    /// A handler required an authenticated caller.
    #[error("Authentication required: {message}")]
    Unauthenticated {
        /// Human-readable message.
        message: String,
    },

    /// No route matched the request.
    #[error("Route not found: {method} {path}")]
    NotFound {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
    },

    /// The request did not complete within its deadline.
    #[error("Timeout: {message}")]
    Timeout {
        /// Human-readable message.
        message: String,
    },

    /// Any other error raised while routing or handling.
    #[error("Internal error: {message}")]
    Unhandled {
        /// Internal message (never shown to clients unless explicitly enabled).
        message: String,
        /// The underlying cause.
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl StoaError {
    /// Creates a malformed input error.
    #[must_use]
    pub fn malformed_input(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    /// Creates a payload too large error.
    #[must_use]
    pub const fn payload_too_large(limit: usize) -> Self {
        Self::PayloadTooLarge { limit }
    }

    /// Creates a CORS policy rejection.
    #[must_use]
    pub fn policy_rejected(reason: impl Into<String>) -> Self {
        Self::PolicyRejected {
            reason: reason.into(),
        }
    }

    /// Creates an unauthenticated error.
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Creates a not found error for a method and path.
    #[must_use]
    pub fn not_found(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::NotFound {
            method: method.into(),
            path: path.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Creates an unhandled error.
    #[must_use]
    pub fn unhandled(message: impl Into<String>) -> Self {
        Self::Unhandled {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an unhandled error with an underlying cause.
    pub fn unhandled_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Unhandled {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedInput { .. } => ErrorCategory::MalformedInput,
            Self::PayloadTooLarge { .. } => ErrorCategory::PayloadTooLarge,
            Self::PolicyRejected { .. } => ErrorCategory::PolicyRejected,
            Self::Unauthenticated { .. } => ErrorCategory::Unauthenticated,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Unhandled { .. } => ErrorCategory::Unhandled,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().status_code()
    }

    /// Returns true if this error maps to a 5xx status.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Returns the message that may be shown to the client.
    ///
    /// Unhandled errors are replaced by a generic message unless
    /// `expose_internal` is set.
    #[must_use]
    pub fn public_message(&self, expose_internal: bool) -> String {
        match self {
            Self::Unhandled { .. } if !expose_internal => REDACTED_MESSAGE.to_string(),
            _ => self.to_string(),
        }
    }

    /// Converts this error to a serializable error envelope.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>, expose_internal: bool) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorDetail {
                code: self.category().code().to_string(),
                message: self.public_message(expose_internal),
                request_id: request_id.map(ToString::to_string),
                details: self.error_details(),
            },
        }
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            Self::PayloadTooLarge { limit } => Some(serde_json::json!({ "limit_bytes": limit })),
            Self::NotFound { method, path } => Some(serde_json::json!({
                "method": method,
                "path": path
            })),
            _ => None,
        }
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Additional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
