//! The standard pipeline stages, in execution order:
//!
//! 1. [`request_logger`] - Log and measure every request
//! 2. [`body_parser`] - Decode JSON bodies
//! 3. [`cors`] - Answer preflights, decorate responses
//! 4. [`auth`] - Attach a verified identity (advisory)
//! 5. [`health_check`] - `GET /health`
//! 6. [`router`] - Delegate to the route table
//! 7. [`not_found`] - Fail whatever is left
//! 8. [`error_handler`] - Render failures (always last)

pub mod auth;
pub mod body_parser;
pub mod cors;
pub mod error_handler;
pub mod health_check;
pub mod not_found;
pub mod request_logger;
pub mod router;

pub use auth::AuthStage;
pub use body_parser::BodyParserStage;
pub use cors::{AllowedOrigins, CorsBuilder, CorsStage};
pub use error_handler::ErrorHandler;
pub use health_check::HealthCheckStage;
pub use not_found::NotFoundStage;
pub use request_logger::RequestLoggerStage;
pub use router::RouterStage;
