//! The stage contract.
//!
//! A stage is one capability in the pipeline. It inspects (and may mutate)
//! the [`RequestContext`], then tells the driver what to do next:
//!
//! - [`StageOutcome::Continue`] - run the next stage
//! - [`StageOutcome::Respond`] - this stage produced the final response
//! - [`StageOutcome::Fail`] - skip straight to the error handler
//!
//! Stages that ran get a second look at the outgoing response through
//! [`Stage::on_response`], called in reverse order.
//!
//! # Example
//!
//! ```
//! use http::StatusCode;
//! use stoa_core::{RequestContext, Response, ResponseExt};
//! use stoa_middleware::{BoxFuture, Stage, StageOutcome};
//!
//! struct Maintenance;
//!
//! impl Stage for Maintenance {
//!     fn name(&self) -> &'static str {
//!         "maintenance"
//!     }
//!
//!     fn process<'a>(&'a self, _ctx: &'a mut RequestContext) -> BoxFuture<'a, StageOutcome> {
//!         Box::pin(async move {
//!             StageOutcome::Respond(Response::text(StatusCode::SERVICE_UNAVAILABLE, "down"))
//!         })
//!     }
//! }
//! ```

use stoa_core::{RequestContext, Response, StoaError};

pub use stoa_router::BoxFuture;

/// What a stage decided.
#[derive(Debug)]
pub enum StageOutcome {
    /// Hand the context to the next stage.
    Continue,
    /// Terminate the chain with this response.
    Respond(Response),
    /// Divert to the error handler.
    Fail(StoaError),
}

impl StageOutcome {
    /// Returns true for [`StageOutcome::Continue`].
    #[must_use]
    pub const fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }
}

/// One capability in the request pipeline.
///
/// Stages are shared across all in-flight requests, so any per-request state
/// belongs on the context, not on the stage.
pub trait Stage: Send + Sync + 'static {
    /// Returns the stage name used for logs and metrics.
    fn name(&self) -> &'static str;

    /// Processes the request.
    fn process<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StageOutcome>;

    /// Observes or decorates the outgoing response.
    ///
    /// Runs for every stage that was entered, whichever stage (or the error
    /// handler) produced the response.
    fn on_response(&self, _ctx: &RequestContext, _response: &mut Response) {}
}
