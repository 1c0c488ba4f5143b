//! Router and handler contracts.

use std::future::Future;
use std::pin::Pin;

use stoa_core::{Identity, RequestContext, Response, StoaError, StoaResult};

/// A boxed future that can be sent across threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A route handler.
///
/// Implemented for any closure of the shape
/// `Fn(&mut RequestContext) -> BoxFuture<'_, StoaResult<Response>>`.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use stoa_core::{Response, ResponseExt};
/// use stoa_router::RouteTable;
///
/// let mut routes = RouteTable::new();
/// routes
///     .get("/ping", |_ctx| {
///         Box::pin(async move { Ok(Response::text(StatusCode::OK, "pong")) })
///     })
///     .unwrap();
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Handles a request.
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StoaResult<Response>>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, StoaResult<Response>>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StoaResult<Response>> {
        self(ctx)
    }
}

/// The router collaborator consulted by the pipeline's router stage.
///
/// The method and path are read from the context.
pub trait Router: Send + Sync + 'static {
    /// Returns the handler's response future for a matching route, or `None`
    /// when nothing matches the request's method and path.
    ///
    /// Implementations may store captured path parameters on the context.
    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
    ) -> Option<BoxFuture<'a, StoaResult<Response>>>;
}

/// Returns the caller identity, or an `Unauthenticated` error for handlers
/// that require one.
///
/// # Example
///
/// ```
/// use stoa_core::{ErrorCategory, Identity, RequestContext};
/// use stoa_router::require_identity;
///
/// let mut ctx = RequestContext::builder().build();
/// let err = require_identity(&ctx).unwrap_err();
/// assert_eq!(err.category(), ErrorCategory::Unauthenticated);
///
/// ctx.attach_identity(Identity::new("user_1")).unwrap();
/// assert_eq!(require_identity(&ctx).unwrap().user_id, "user_1");
/// ```
pub fn require_identity(ctx: &RequestContext) -> Result<&Identity, StoaError> {
    ctx.identity()
        .ok_or_else(|| StoaError::unauthenticated("this route requires a signed-in user"))
}
