//! # Stoa Server
//!
//! HTTP server for the Stoa request pipeline.
//!
//! - HTTP/1.1 via Hyper, one task per connection
//! - Size and time bounded body collection
//! - Per-request panic isolation
//! - Graceful shutdown on SIGINT/SIGTERM
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stoa_config::StoaConfig;
//! use stoa_middleware::identity::DisabledIdentityProvider;
//! use stoa_middleware::Pipeline;
//! use stoa_router::RouteTable;
//! use stoa_server::{Server, ShutdownSignal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoaConfig::default();
//!     let pipeline = Arc::new(Pipeline::standard(
//!         &config,
//!         Arc::new(RouteTable::new()),
//!         Arc::new(DisabledIdentityProvider),
//!     ));
//!
//!     let shutdown = ShutdownSignal::with_os_signals();
//!     Server::from_config(&config, pipeline)?
//!         .run_with_shutdown(shutdown)
//!         .await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/stoa-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
mod server;
pub mod shutdown;

pub use config::{ServerSettings, ServerSettingsBuilder};
pub use error::ServerError;
pub use server::Server;
pub use shutdown::{ConnectionGuard, ConnectionTracker, ShutdownSignal};
