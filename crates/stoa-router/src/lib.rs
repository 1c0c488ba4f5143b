//! Router contract and route table for Stoa.
//!
//! The pipeline's router stage depends only on the [`Router`] trait. A router
//! either claims a request (returning the handler's response future) or
//! reports it as unmatched, after which the not-found stage answers.
//!
//! [`RouteTable`] is the concrete router used by the `stoa` binary. It stores
//! routes in a segment tree:
//!
//! ```text
//!              (root)
//!                │
//!        ┌───────┴───────┐
//!      "api"          "files"
//!        │               │
//!      "me"           "*rest"
//!     [GET]            [GET]
//! ```
//!
//! # Example
//!
//! ```
//! use http::{Method, StatusCode};
//! use stoa_core::{RequestContext, Response, ResponseExt};
//! use stoa_router::{RouteTable, Router};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut routes = RouteTable::new();
//! routes.get("/files/*rest", |ctx| {
//!     Box::pin(async move {
//!         let rest = ctx.route_param("rest").unwrap_or_default().to_string();
//!         Ok(Response::text(StatusCode::OK, rest))
//!     })
//! })?;
//!
//! let mut ctx = RequestContext::builder()
//!     .method(Method::GET)
//!     .uri("/files/a/b.txt")
//!     .build();
//! let response = routes.handle(&mut ctx).expect("route matches").await?;
//! assert_eq!(response.status(), StatusCode::OK);
//! assert_eq!(ctx.route_param("rest"), Some("a/b.txt"));
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/stoa-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod handler;
mod node;
mod table;

pub use handler::{require_identity, BoxFuture, Handler, Router};
pub use table::RouteTable;

use http::Method;
use thiserror::Error;

/// Errors raised while registering routes.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The pattern could not be parsed or conflicts with an existing route.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A handler already exists for this method and pattern.
    #[error("duplicate route: {method} {pattern}")]
    Duplicate {
        /// The HTTP method.
        method: Method,
        /// The route pattern.
        pattern: String,
    },
}

impl RouteError {
    pub(crate) fn invalid(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}
