//! # Stoa Core
//!
//! Core types shared by every Stoa crate:
//!
//! - [`RequestContext`] - Per-request state threaded through the pipeline
//! - [`RequestId`] - UUID v7 request identifier
//! - [`Identity`] - Verified caller identity attached by the auth stage
//! - [`StoaError`] - The error taxonomy rendered by the error handler
//! - [`Response`] / [`ResponseExt`] - The response type produced by stages

#![doc(html_root_url = "https://docs.rs/stoa-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
mod identity;
mod response;

pub use context::{
    AuthOutcome, ContextError, RawBody, RequestContext, RequestContextBuilder, RequestId,
};
pub use error::{ErrorCategory, ErrorDetail, ErrorEnvelope, StoaError, StoaResult};
pub use identity::Identity;
pub use response::{Response, ResponseExt, REQUEST_ID_HEADER};
