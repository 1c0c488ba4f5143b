//! Fallback for requests nothing claimed.

use stoa_core::{RequestContext, StoaError};

use crate::stage::{BoxFuture, Stage, StageOutcome};

/// Fails every request that reaches it with `NotFound`, leaving the response
/// body to the error handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFoundStage;

impl Stage for NotFoundStage {
    fn name(&self) -> &'static str {
        "not_found"
    }

    fn process<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StageOutcome> {
        Box::pin(async move {
            StageOutcome::Fail(StoaError::not_found(ctx.method().as_str(), ctx.path()))
        })
    }
}
