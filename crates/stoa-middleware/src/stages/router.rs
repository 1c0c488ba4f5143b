//! Router delegation stage.

use std::sync::Arc;

use stoa_core::RequestContext;
use stoa_router::Router;

use crate::stage::{BoxFuture, Stage, StageOutcome};

/// Hands the request to the [`Router`] collaborator.
///
/// A matched route's response becomes [`StageOutcome::Respond`]; a handler
/// error becomes [`StageOutcome::Fail`]. Unmatched requests continue to the
/// not-found stage.
#[derive(Clone)]
pub struct RouterStage {
    router: Arc<dyn Router>,
}

impl std::fmt::Debug for RouterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterStage").finish_non_exhaustive()
    }
}

impl RouterStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(router: Arc<dyn Router>) -> Self {
        Self { router }
    }
}

impl Stage for RouterStage {
    fn name(&self) -> &'static str {
        "router"
    }

    fn process<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StageOutcome> {
        Box::pin(async move {
            let Some(handler) = self.router.handle(ctx) else {
                return StageOutcome::Continue;
            };
            match handler.await {
                Ok(response) => StageOutcome::Respond(response),
                Err(e) => StageOutcome::Fail(e),
            }
        })
    }
}
