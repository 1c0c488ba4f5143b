//! # Stoa
//!
//! **An HTTP request pipeline with a fixed stage order**
//!
//! Every request walks the same chain:
//!
//! ```text
//! Logger → Body Parser → CORS → Auth → Health Check → Router → Not-Found → Error Handler
//! ```
//!
//! - **Uniform errors**: every failure becomes one JSON envelope with a
//!   request id, rendered in exactly one place
//! - **Advisory auth**: a verified identity is attached when present, and
//!   handlers decide whether to require it
//! - **Strict CORS**: only allow-listed origins ever see credential headers
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use stoa::prelude::*;
//! use stoa::middleware::identity::provider_from_config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = StoaConfig::default();
//!     let provider = provider_from_config(&config.identity)?;
//!     let pipeline = Pipeline::standard(&config, Arc::new(stoa::bootstrap::routes()?), provider);
//!
//!     Server::from_config(&config, Arc::new(pipeline))?.run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/stoa/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bootstrap;

// Re-export core types
pub use stoa_core as core;

// Re-export configuration
pub use stoa_config as config;

// Re-export telemetry
pub use stoa_telemetry as telemetry;

// Re-export router types
pub use stoa_router as router;

// Re-export the pipeline and its stages
pub use stoa_middleware as middleware;

// Re-export server types
pub use stoa_server as server;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
///
/// ```
/// use stoa::prelude::*;
/// ```
pub mod prelude {
    pub use stoa_config::StoaConfig;
    pub use stoa_core::{
        AuthOutcome, Identity, RequestContext, RequestId, Response, ResponseExt, StoaError,
        StoaResult,
    };
    pub use stoa_middleware::{IdentityProvider, Pipeline, Stage, StageOutcome};
    pub use stoa_router::{require_identity, RouteTable, Router};
    pub use stoa_server::{Server, ShutdownSignal};
}
