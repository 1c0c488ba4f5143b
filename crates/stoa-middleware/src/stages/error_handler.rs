//! Error handler.
//!
//! The single sink for failures. Every [`StoaError`] raised by a stage or
//! route handler is rendered here into the standard envelope:
//!
//! ```json
//! {
//!   "error": {
//!     "code": "NOT_FOUND",
//!     "message": "Route not found: GET /x",
//!     "request_id": "0190b7a4-...",
//!     "details": { "method": "GET", "path": "/x" }
//!   }
//! }
//! ```
//!
//! Internal error messages are replaced with a generic one unless
//! `expose_internal_errors` is set, which is meant for development only.

use stoa_core::{RequestContext, Response, ResponseExt, StoaError};

/// Renders errors into envelope responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorHandler {
    expose_internal_errors: bool,
}

impl ErrorHandler {
    /// Stage name recorded as the terminal stage.
    pub const NAME: &'static str = "error_handler";

    /// Creates a handler that redacts internal errors.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            expose_internal_errors: false,
        }
    }

    /// Sets whether internal error messages reach the client.
    #[must_use]
    pub const fn expose_internal_errors(mut self, expose: bool) -> Self {
        self.expose_internal_errors = expose;
        self
    }

    /// Returns the stage name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Renders `error` and marks the request as terminated by this handler.
    pub fn render(&self, ctx: &mut RequestContext, error: &StoaError) -> Response {
        if let Err(e) = ctx.mark_terminal(Self::NAME) {
            tracing::warn!(request_id = %ctx.request_id(), error = %e, "Error handler reached after termination");
        }

        self.log(ctx, error);

        let request_id = ctx.request_id().to_string();
        let envelope = error.to_envelope(Some(&request_id), self.expose_internal_errors);
        Response::json(error.status_code(), &envelope)
    }

    fn log(&self, ctx: &RequestContext, error: &StoaError) {
        let status = error.status_code().as_u16();
        let code = error.category().code();

        if error.is_server_error() {
            let cause = match error {
                StoaError::Unhandled {
                    source: Some(source),
                    ..
                } => format!("{source:#}"),
                _ => String::new(),
            };
            tracing::error!(
                request_id = %ctx.request_id(),
                http.method = %ctx.method(),
                http.path = %ctx.path(),
                http.status_code = status,
                error.code = code,
                error = %error,
                cause = %cause,
                "Request failed with server error"
            );
        } else if matches!(
            error,
            StoaError::PolicyRejected { .. } | StoaError::Unauthenticated { .. }
        ) {
            tracing::warn!(
                request_id = %ctx.request_id(),
                http.status_code = status,
                error.code = code,
                error = %error,
                "Request rejected"
            );
        } else {
            tracing::debug!(
                request_id = %ctx.request_id(),
                http.status_code = status,
                error.code = code,
                error = %error,
                "Request failed"
            );
        }
    }
}
