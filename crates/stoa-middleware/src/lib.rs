//! # Stoa Middleware
//!
//! The request pipeline every inbound request passes through.
//!
//! ## Pipeline Stages
//!
//! ```text
//! Request → Logger → Body Parser → CORS → Auth → Health Check → Router → Not-Found
//!                                                                            ↓
//! Response ←─────────── on_response hooks (reverse order) ←───────── Error Handler
//! ```
//!
//! | Stage | Name             | Purpose                                           |
//! |-------|------------------|---------------------------------------------------|
//! | 1     | `request_logger` | Structured request logs and request metrics       |
//! | 2     | `body_parser`    | Decode JSON bodies into the context               |
//! | 3     | `cors`           | Answer preflights, add CORS headers               |
//! | 4     | `auth`           | Attach a verified identity (never blocks)         |
//! | 5     | `health_check`   | `GET /health` → `{"status":"ok"}`                 |
//! | 6     | `router`         | Delegate to the route table                       |
//! | 7     | `not_found`      | Fail anything left unclaimed                      |
//! | 8     | `error_handler`  | Render failures into the error envelope           |
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use http::{Method, StatusCode};
//! use stoa_config::StoaConfig;
//! use stoa_core::RequestContext;
//! use stoa_middleware::identity::DisabledIdentityProvider;
//! use stoa_middleware::Pipeline;
//! use stoa_router::RouteTable;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let pipeline = Pipeline::standard(
//!     &StoaConfig::default(),
//!     Arc::new(RouteTable::new()),
//!     Arc::new(DisabledIdentityProvider),
//! );
//!
//! let mut ctx = RequestContext::builder()
//!     .method(Method::GET)
//!     .uri("/health")
//!     .build();
//! let response = pipeline.process(&mut ctx).await;
//! assert_eq!(response.status(), StatusCode::OK);
//! assert_eq!(ctx.terminal_stage(), Some("health_check"));
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/stoa-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod identity;
pub mod pipeline;
pub mod stage;
pub mod stages;

pub use identity::{Credentials, IdentityError, IdentityProvider};
pub use pipeline::{BoxedStage, Pipeline, PipelineBuilder};
pub use stage::{BoxFuture, Stage, StageOutcome};
