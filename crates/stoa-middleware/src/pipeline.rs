//! Ordered request pipeline.
//!
//! The pipeline is a fixed list of [`Stage`]s driven by a loop. Each stage
//! runs in declaration order until one responds or fails. A failure skips
//! every remaining stage and goes straight to the [`ErrorHandler`], which the
//! builder always places last. Once a response exists, the `on_response`
//! hooks of every stage that ran are applied in reverse order.
//!
//! A stage that panics is treated as having failed with an unhandled error,
//! so the panic is rendered by the error handler like any other failure.
//!
//! ## Standard Order
//!
//! ```text
//! Logger → Body Parser → CORS → Auth → Health Check → Router → Not-Found → Error Handler
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use stoa_config::StoaConfig;
//! use stoa_middleware::identity::DisabledIdentityProvider;
//! use stoa_middleware::Pipeline;
//! use stoa_router::RouteTable;
//!
//! let pipeline = Pipeline::standard(
//!     &StoaConfig::default(),
//!     Arc::new(RouteTable::new()),
//!     Arc::new(DisabledIdentityProvider),
//! );
//!
//! assert_eq!(
//!     pipeline.stage_names(),
//!     vec![
//!         "request_logger",
//!         "body_parser",
//!         "cors",
//!         "auth",
//!         "health_check",
//!         "router",
//!         "not_found",
//!         "error_handler",
//!     ]
//! );
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use http::HeaderValue;
use stoa_config::StoaConfig;
use stoa_core::{RequestContext, Response, StoaError, REQUEST_ID_HEADER};
use stoa_router::Router;

use crate::identity::IdentityProvider;
use crate::stage::{Stage, StageOutcome};
use crate::stages::{
    AuthStage, BodyParserStage, CorsStage, ErrorHandler, HealthCheckStage, NotFoundStage,
    RequestLoggerStage, RouterStage,
};

/// A type-erased stage that can be stored in a vector.
pub type BoxedStage = Arc<dyn Stage>;

/// An immutable, ordered chain of stages ending in the error handler.
pub struct Pipeline {
    stages: Vec<BoxedStage>,
    error_handler: ErrorHandler,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Assembles the standard production pipeline.
    #[must_use]
    pub fn standard(
        config: &StoaConfig,
        router: Arc<dyn Router>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self::builder()
            .stage(RequestLoggerStage::new())
            .stage(BodyParserStage::new(config.server.max_body_bytes))
            .stage(CorsStage::from_config(&config.cors))
            .stage(AuthStage::from_config(provider, &config.identity))
            .stage(HealthCheckStage::default())
            .stage(RouterStage::new(router))
            .stage(NotFoundStage)
            .error_handler(
                ErrorHandler::new().expose_internal_errors(config.server.expose_internal_errors),
            )
            .build()
    }

    /// Runs a request through the pipeline and returns the final response.
    ///
    /// The response always carries the `x-request-id` header.
    pub async fn process(&self, ctx: &mut RequestContext) -> Response {
        let mut entered = 0;
        let mut failure = None;
        let mut response = None;

        for stage in &self.stages {
            entered += 1;
            tracing::trace!(request_id = %ctx.request_id(), stage = stage.name(), "Stage entered");

            let outcome = AssertUnwindSafe(stage.process(ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    StageOutcome::Fail(stage_panicked(stage.name(), panic.as_ref()))
                });

            match outcome {
                StageOutcome::Continue => {}
                StageOutcome::Respond(r) => {
                    if let Err(e) = ctx.mark_terminal(stage.name()) {
                        tracing::warn!(request_id = %ctx.request_id(), error = %e, "Duplicate terminal stage");
                    }
                    response = Some(r);
                    break;
                }
                StageOutcome::Fail(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let response = match (response, failure) {
            (Some(r), _) => r,
            (None, Some(e)) => self.error_handler.render(ctx, &e),
            (None, None) => self
                .error_handler
                .render(ctx, &StoaError::unhandled("no stage produced a response")),
        };

        self.finish(ctx, response, entered)
    }

    /// Renders `error` for a request whose pipeline run was lost.
    ///
    /// Used by the server when the task driving [`Pipeline::process`] did not
    /// complete. The error handler renders the envelope and every stage's
    /// `on_response` hook runs, so the response is decorated the same way as
    /// any other failure.
    pub fn recover(&self, ctx: &mut RequestContext, error: &StoaError) -> Response {
        let response = self.error_handler.render(ctx, error);
        self.finish(ctx, response, self.stages.len())
    }

    fn finish(&self, ctx: &RequestContext, mut response: Response, entered: usize) -> Response {
        if let Ok(value) = HeaderValue::from_str(&ctx.request_id().to_string()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        for stage in self.stages[..entered].iter().rev() {
            let hook = std::panic::catch_unwind(AssertUnwindSafe(|| {
                stage.on_response(ctx, &mut response);
            }));
            if hook.is_err() {
                tracing::error!(request_id = %ctx.request_id(), stage = stage.name(), "Response hook panicked");
            }
        }

        response
    }

    /// Returns the stage names in execution order, error handler last.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages
            .iter()
            .map(|s| s.name())
            .chain(std::iter::once(self.error_handler.name()))
            .collect()
    }

    /// Returns the number of stages, including the error handler.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len() + 1
    }
}

fn stage_panicked(stage: &'static str, payload: &(dyn Any + Send)) -> StoaError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "opaque panic payload".to_string());
    StoaError::unhandled(format!("stage '{stage}' panicked: {detail}"))
}

/// Builder for constructing a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedStage>,
    error_handler: ErrorHandler,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage<S: Stage>(mut self, stage: S) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Appends a shared stage.
    #[must_use]
    pub fn boxed_stage(mut self, stage: BoxedStage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Replaces the error handler.
    #[must_use]
    pub fn error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = handler;
        self
    }

    /// Builds the pipeline with the error handler appended last.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
            error_handler: self.error_handler,
        }
    }
}
