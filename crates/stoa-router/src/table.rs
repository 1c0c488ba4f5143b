//! Pattern-based route table.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use stoa_core::{RequestContext, Response, StoaResult};

use crate::handler::{BoxFuture, Handler, Router};
use crate::node::Node;
use crate::RouteError;

/// A [`Router`] backed by a path tree.
///
/// Patterns support static segments, `{param}` segments and a trailing
/// `*rest` wildcard. When several patterns could match, static segments win
/// over parameters, which win over wildcards. A path that only matches under
/// a different method is unmatched, except that `HEAD` falls back to `GET`.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use stoa_core::{Response, ResponseExt};
/// use stoa_router::RouteTable;
///
/// # fn main() -> Result<(), stoa_router::RouteError> {
/// let mut routes = RouteTable::new();
/// routes
///     .get("/users/{id}", |ctx| {
///         Box::pin(async move {
///             let id = ctx.route_param("id").unwrap_or_default().to_string();
///             Ok(Response::json(StatusCode::OK, &serde_json::json!({ "id": id })))
///         })
///     })?
///     .delete("/users/{id}", |_ctx| {
///         Box::pin(async move { Ok(Response::empty(StatusCode::NO_CONTENT)) })
///     })?;
///
/// assert_eq!(routes.len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct RouteTable {
    root: Node<Arc<dyn Handler>>,
    routes: Vec<(Method, String)>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::root(),
            routes: Vec::new(),
        }
    }

    /// Registers a handler for `method` and `pattern`.
    ///
    /// Closures are easier to register through the per-method helpers, which
    /// pin down the closure signature.
    pub fn route<H: Handler>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<&mut Self, RouteError> {
        let segments = Node::<Arc<dyn Handler>>::parse_pattern(pattern)?;
        self.root
            .insert(pattern, &segments, method.clone(), Arc::new(handler))?;
        self.routes.push((method, pattern.to_string()));
        Ok(self)
    }

    /// Registers a GET closure handler.
    pub fn get<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, StoaResult<Response>>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::GET, pattern, handler)
    }

    /// Registers a POST closure handler.
    pub fn post<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, StoaResult<Response>>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::POST, pattern, handler)
    }

    /// Registers a PUT closure handler.
    pub fn put<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, StoaResult<Response>>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::PUT, pattern, handler)
    }

    /// Registers a PATCH closure handler.
    pub fn patch<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, StoaResult<Response>>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::PATCH, pattern, handler)
    }

    /// Registers a DELETE closure handler.
    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, StoaResult<Response>>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::DELETE, pattern, handler)
    }

    /// Returns the registered `(method, pattern)` pairs in registration order.
    #[must_use]
    pub fn routes(&self) -> &[(Method, String)] {
        &self.routes
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Finds the handler for `method` and `path`.
    ///
    /// A `HEAD` request with no `HEAD` route of its own is served by the `GET`
    /// route for the same path.
    fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(&Arc<dyn Handler>, HashMap<String, String>)> {
        let mut params = Vec::new();
        let handler = match self.root.find(method, path, &mut params) {
            Some(handler) => handler,
            None if *method == Method::HEAD => {
                params.clear();
                self.root.find(&Method::GET, path, &mut params)?
            }
            None => return None,
        };
        Some((handler, params.into_iter().collect()))
    }
}

impl Router for RouteTable {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
    ) -> Option<BoxFuture<'a, StoaResult<Response>>> {
        let (handler, params) = self.lookup(ctx.method(), ctx.path())?;
        tracing::debug!(
            request_id = %ctx.request_id(),
            params = params.len(),
            "Route matched"
        );
        ctx.set_route_params(params);
        Some(handler.call(ctx))
    }
}
