//! Request logging stage.
//!
//! First in the pipeline. Logs the request on entry and the outcome on the
//! way out, and feeds the request counters:
//!
//! - `stoa_requests_total` - by method, status and producing stage
//! - `stoa_request_duration_seconds` - latency histogram
//! - `stoa_in_flight_requests` - held for the lifetime of the context

use stoa_core::{RequestContext, Response};
use stoa_telemetry::metrics::record_request;
use stoa_telemetry::InFlightGuard;

use crate::stage::{BoxFuture, Stage, StageOutcome};

/// Logs every request and records request metrics. Never terminates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLoggerStage;

impl RequestLoggerStage {
    /// Creates the stage.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Stage for RequestLoggerStage {
    fn name(&self) -> &'static str {
        "request_logger"
    }

    fn process<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StageOutcome> {
        Box::pin(async move {
            tracing::info!(
                request_id = %ctx.request_id(),
                http.method = %ctx.method(),
                http.path = %ctx.path(),
                remote_addr = ?ctx.remote_addr(),
                "Request received"
            );
            ctx.set_extension(InFlightGuard::new());
            StageOutcome::Continue
        })
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        let elapsed = ctx.elapsed();
        let status = response.status();
        let stage = ctx.terminal_stage().unwrap_or("none");

        record_request(ctx.method().as_str(), status.as_u16(), stage, elapsed);

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = elapsed.as_millis() as u64;

        if status.is_server_error() {
            tracing::warn!(
                request_id = %ctx.request_id(),
                http.method = %ctx.method(),
                http.path = %ctx.path(),
                http.status_code = status.as_u16(),
                duration_ms,
                stage,
                auth.outcome = ctx.auth_outcome().as_str(),
                "Request failed"
            );
        } else {
            tracing::info!(
                request_id = %ctx.request_id(),
                http.method = %ctx.method(),
                http.path = %ctx.path(),
                http.status_code = status.as_u16(),
                duration_ms,
                stage,
                auth.outcome = ctx.auth_outcome().as_str(),
                "Request completed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use stoa_core::ResponseExt;

    #[tokio::test]
    async fn test_never_terminates() {
        let stage = RequestLoggerStage::new();
        let mut ctx = RequestContext::builder().uri("/anything").build();

        assert!(stage.process(&mut ctx).await.is_continue());
        assert!(ctx.extension::<InFlightGuard>().is_some());
    }

    #[test]
    fn test_on_response_leaves_response_untouched() {
        let stage = RequestLoggerStage::new();
        let ctx = RequestContext::builder().build();
        let mut response = Response::empty(StatusCode::NO_CONTENT);

        stage.on_response(&ctx, &mut response);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().is_empty());
    }
}
