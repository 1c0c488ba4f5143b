//! CORS (Cross-Origin Resource Sharing) stage.
//!
//! ## Preflight Requests
//!
//! An `OPTIONS` request carrying both `Origin` and
//! `Access-Control-Request-Method` is a preflight. It is answered here with
//! `204 No Content` when the origin, method and requested headers are all
//! allowed, and failed with `PolicyRejected` (403) otherwise.
//!
//! ## Simple Requests
//!
//! Never blocked. On the way out, a response to an allowed origin gets:
//!
//! - `Access-Control-Allow-Origin`
//! - `Access-Control-Allow-Credentials: true` (when enabled)
//! - `Access-Control-Expose-Headers` (when configured)
//! - `Vary: Origin`
//!
//! A response to any other origin gets no CORS headers at all. With an
//! explicit allow-list every response to a request carrying `Origin` gets
//! `Vary: Origin`.
//!
//! ## Example
//!
//! ```
//! use stoa_middleware::stages::CorsStage;
//! use http::Method;
//! use std::time::Duration;
//!
//! let cors = CorsStage::builder()
//!     .allow_origin("https://app.example.com")
//!     .allow_methods([Method::GET, Method::POST])
//!     .allow_credentials(true)
//!     .max_age(Duration::from_secs(600))
//!     .build();
//!
//! assert!(cors.is_origin_allowed("https://app.example.com"));
//! assert!(!cors.is_origin_allowed("https://evil.example.com"));
//! ```

use std::time::Duration;

use http::{HeaderValue, Method, StatusCode};
use stoa_config::CorsConfig;
use stoa_core::{RequestContext, Response, ResponseExt, StoaError};

use crate::stage::{BoxFuture, Stage, StageOutcome};

/// CORS header names.
pub mod headers {
    /// `Access-Control-Allow-Origin` header.
    pub const ALLOW_ORIGIN: &str = "access-control-allow-origin";
    /// `Access-Control-Allow-Methods` header.
    pub const ALLOW_METHODS: &str = "access-control-allow-methods";
    /// `Access-Control-Allow-Headers` header.
    pub const ALLOW_HEADERS: &str = "access-control-allow-headers";
    /// `Access-Control-Allow-Credentials` header.
    pub const ALLOW_CREDENTIALS: &str = "access-control-allow-credentials";
    /// `Access-Control-Max-Age` header.
    pub const MAX_AGE: &str = "access-control-max-age";
    /// `Access-Control-Expose-Headers` header.
    pub const EXPOSE_HEADERS: &str = "access-control-expose-headers";
    /// `Access-Control-Request-Method` header (preflight).
    pub const REQUEST_METHOD: &str = "access-control-request-method";
    /// `Access-Control-Request-Headers` header (preflight).
    pub const REQUEST_HEADERS: &str = "access-control-request-headers";
    /// `Origin` header.
    pub const ORIGIN: &str = "origin";
    /// `Vary` header.
    pub const VARY: &str = "vary";
}

/// The set of allowed origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// Any origin (`*`).
    Any,
    /// An explicit allow-list.
    List(Vec<String>),
}

impl AllowedOrigins {
    /// Checks if an origin is allowed.
    pub fn is_allowed(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::List(origins) => origins.iter().any(|o| o == origin),
        }
    }

    /// Returns the `Access-Control-Allow-Origin` value for an allowed origin.
    fn header_value(&self, origin: &str) -> Option<HeaderValue> {
        match self {
            Self::Any => Some(HeaderValue::from_static("*")),
            Self::List(_) if self.is_allowed(origin) => HeaderValue::from_str(origin).ok(),
            Self::List(_) => None,
        }
    }
}

/// Applies the CORS policy.
#[derive(Debug, Clone)]
pub struct CorsStage {
    allowed_origins: AllowedOrigins,
    allowed_methods: Vec<Method>,
    /// Lowercase. Empty mirrors the preflight's requested headers.
    allowed_headers: Vec<String>,
    expose_headers: Vec<String>,
    allow_credentials: bool,
    max_age: Option<Duration>,
}

/// Builder for [`CorsStage`].
#[derive(Debug, Clone)]
pub struct CorsBuilder {
    stage: CorsStage,
}

impl Default for CorsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CorsBuilder {
    /// Creates a builder that allows no origins and the default methods.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stage: CorsStage {
                allowed_origins: AllowedOrigins::List(Vec::new()),
                allowed_methods: vec![
                    Method::GET,
                    Method::HEAD,
                    Method::PUT,
                    Method::PATCH,
                    Method::POST,
                    Method::DELETE,
                ],
                allowed_headers: Vec::new(),
                expose_headers: Vec::new(),
                allow_credentials: false,
                max_age: None,
            },
        }
    }

    /// Allows any origin.
    ///
    /// Browsers refuse `*` together with credentials, so configuration
    /// validation rejects that combination.
    #[must_use]
    pub fn allow_any_origin(mut self) -> Self {
        self.stage.allowed_origins = AllowedOrigins::Any;
        self
    }

    /// Adds an allowed origin.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        if let AllowedOrigins::List(origins) = &mut self.stage.allowed_origins {
            origins.push(origin.into());
        }
        self
    }

    /// Sets the allowed methods.
    #[must_use]
    pub fn allow_methods<I>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        self.stage.allowed_methods = methods.into_iter().collect();
        self
    }

    /// Sets the allowed request headers.
    #[must_use]
    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stage.allowed_headers = headers
            .into_iter()
            .map(|h| h.into().to_ascii_lowercase())
            .collect();
        self
    }

    /// Sets the response headers exposed to the browser.
    #[must_use]
    pub fn expose_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stage.expose_headers = headers
            .into_iter()
            .map(|h| h.into().to_ascii_lowercase())
            .collect();
        self
    }

    /// Sets whether allowed origins may send credentials.
    #[must_use]
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.stage.allow_credentials = allow;
        self
    }

    /// Sets the preflight cache lifetime.
    #[must_use]
    pub fn max_age(mut self, duration: Duration) -> Self {
        self.stage.max_age = Some(duration);
        self
    }

    /// Builds the stage.
    #[must_use]
    pub fn build(self) -> CorsStage {
        self.stage
    }
}

impl CorsStage {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> CorsBuilder {
        CorsBuilder::new()
    }

    /// Creates the stage from the `[cors]` configuration section.
    ///
    /// Unparseable methods are skipped; configuration validation reports them.
    #[must_use]
    pub fn from_config(config: &CorsConfig) -> Self {
        let mut builder = CorsBuilder::new();
        if config.allowed_origins.iter().any(|o| o == "*") {
            builder = builder.allow_any_origin();
        } else {
            builder = config
                .allowed_origins
                .iter()
                .fold(builder, |b, origin| b.allow_origin(origin.clone()));
        }

        let methods = config
            .allowed_methods
            .iter()
            .filter_map(|m| m.to_ascii_uppercase().parse::<Method>().ok());

        let mut builder = builder
            .allow_methods(methods)
            .allow_headers(config.allowed_headers.iter().cloned())
            .expose_headers(config.exposed_headers.iter().cloned())
            .allow_credentials(config.allow_credentials);
        if let Some(secs) = config.max_age_secs {
            builder = builder.max_age(Duration::from_secs(secs));
        }
        builder.build()
    }

    /// Checks an origin against the allow-list.
    #[must_use]
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.is_allowed(origin)
    }

    fn is_preflight(ctx: &RequestContext) -> bool {
        ctx.method() == Method::OPTIONS
            && ctx.headers().contains_key(headers::ORIGIN)
            && ctx.headers().contains_key(headers::REQUEST_METHOD)
    }

    /// Validates a preflight and builds its response.
    fn handle_preflight(&self, ctx: &RequestContext) -> Result<Response, StoaError> {
        let origin = ctx
            .header(headers::ORIGIN)
            .ok_or_else(|| StoaError::policy_rejected("invalid Origin header"))?;
        if !self.allowed_origins.is_allowed(origin) {
            return Err(StoaError::policy_rejected(format!(
                "origin '{origin}' is not allowed"
            )));
        }

        let method = ctx
            .header(headers::REQUEST_METHOD)
            .and_then(|m| m.trim().parse::<Method>().ok())
            .ok_or_else(|| StoaError::policy_rejected("invalid Access-Control-Request-Method"))?;
        if !self.allowed_methods.contains(&method) {
            return Err(StoaError::policy_rejected(format!(
                "method {method} is not allowed"
            )));
        }

        let requested_headers = ctx.header(headers::REQUEST_HEADERS).unwrap_or_default();
        if !self.allowed_headers.is_empty() {
            if let Some(header) = requested_headers
                .split(',')
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .find(|h| !self.allowed_headers.contains(h))
            {
                return Err(StoaError::policy_rejected(format!(
                    "header '{header}' is not allowed"
                )));
            }
        }

        Ok(self.preflight_response(origin, requested_headers))
    }

    fn preflight_response(&self, origin: &str, requested_headers: &str) -> Response {
        let mut response = Response::empty(StatusCode::NO_CONTENT);
        let headers_mut = response.headers_mut();

        if let Some(value) = self.allowed_origins.header_value(origin) {
            headers_mut.insert(headers::ALLOW_ORIGIN, value);
        }
        if self.allow_credentials {
            headers_mut.insert(headers::ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }

        let methods: Vec<&str> = self.allowed_methods.iter().map(Method::as_str).collect();
        if let Ok(value) = HeaderValue::from_str(&methods.join(",")) {
            headers_mut.insert(headers::ALLOW_METHODS, value);
        }

        let allow_headers = if self.allowed_headers.is_empty() {
            requested_headers.to_string()
        } else {
            self.allowed_headers.join(",")
        };
        if !allow_headers.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&allow_headers) {
                headers_mut.insert(headers::ALLOW_HEADERS, value);
            }
        }

        if let Some(max_age) = self.max_age {
            headers_mut.insert(headers::MAX_AGE, HeaderValue::from(max_age.as_secs()));
        }

        headers_mut.insert(
            headers::VARY,
            HeaderValue::from_static("Origin, Access-Control-Request-Headers"),
        );
        response
    }

    /// Adds CORS headers for an allowed origin.
    ///
    /// With an explicit allow-list the answer depends on `Origin`, so every
    /// such response carries `Vary: Origin`, allowed or not.
    fn decorate(&self, response: &mut Response, origin: &str) {
        if matches!(self.allowed_origins, AllowedOrigins::List(_)) {
            vary_on_origin(response);
        }
        let Some(value) = self.allowed_origins.header_value(origin) else {
            return;
        };
        let headers_mut = response.headers_mut();
        headers_mut.insert(headers::ALLOW_ORIGIN, value);

        if self.allow_credentials {
            headers_mut.insert(headers::ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        if !self.expose_headers.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&self.expose_headers.join(",")) {
                headers_mut.insert(headers::EXPOSE_HEADERS, value);
            }
        }
    }
}

/// Makes sure `Vary` lists `Origin`, keeping whatever it already names.
fn vary_on_origin(response: &mut Response) {
    let headers_mut = response.headers_mut();
    let merged = match headers_mut.get(headers::VARY).and_then(|v| v.to_str().ok()) {
        None => HeaderValue::from_static("Origin"),
        Some(existing)
            if existing
                .split(',')
                .any(|v| v.trim() == "*" || v.trim().eq_ignore_ascii_case("origin")) =>
        {
            return;
        }
        Some(existing) => match HeaderValue::from_str(&format!("{existing}, Origin")) {
            Ok(value) => value,
            Err(_) => return,
        },
    };
    headers_mut.insert(headers::VARY, merged);
}

impl Stage for CorsStage {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn process<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StageOutcome> {
        Box::pin(async move {
            if !Self::is_preflight(ctx) {
                return StageOutcome::Continue;
            }
            match self.handle_preflight(ctx) {
                Ok(response) => StageOutcome::Respond(response),
                Err(e) => {
                    tracing::debug!(request_id = %ctx.request_id(), error = %e, "Preflight rejected");
                    StageOutcome::Fail(e)
                }
            }
        })
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        if response.headers().contains_key(headers::ALLOW_ORIGIN) {
            return;
        }
        if let Some(origin) = ctx.header(headers::ORIGIN) {
            self.decorate(response, origin);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALLOWED: &str = "http://54.172.192.158";

    fn cors() -> CorsStage {
        CorsStage::from_config(&CorsConfig::default())
    }

    fn preflight(origin: &str, method: &str, request_headers: Option<&str>) -> RequestContext {
        let mut builder = RequestContext::builder()
            .method(Method::OPTIONS)
            .uri("/api/items")
            .header(headers::ORIGIN, origin)
            .header(headers::REQUEST_METHOD, method);
        if let Some(h) = request_headers {
            builder = builder.header(headers::REQUEST_HEADERS, h);
        }
        builder.build()
    }

    fn simple(origin: &str) -> RequestContext {
        RequestContext::builder()
            .method(Method::GET)
            .uri("/api/items")
            .header(headers::ORIGIN, origin)
            .build()
    }

    fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
        response.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[test]
    fn test_from_config_defaults() {
        let cors = cors();
        assert!(cors.is_origin_allowed(ALLOWED));
        assert!(!cors.is_origin_allowed("http://localhost:3000"));
        assert!(cors.allow_credentials);
        assert_eq!(cors.allowed_methods.len(), 6);
        assert!(cors.allowed_headers.is_empty());
    }

    #[test]
    fn test_from_config_wildcard() {
        let config = CorsConfig {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: false,
            ..CorsConfig::default()
        };
        let cors = CorsStage::from_config(&config);
        assert_eq!(cors.allowed_origins, AllowedOrigins::Any);
        assert!(cors.is_origin_allowed("https://anything.example"));
    }

    #[tokio::test]
    async fn test_preflight_allowed() {
        let cors = cors();
        let mut ctx = preflight(ALLOWED, "POST", Some("content-type, x-custom"));

        let StageOutcome::Respond(response) = cors.process(&mut ctx).await else {
            panic!("expected preflight response");
        };
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(header(&response, headers::ALLOW_ORIGIN), Some(ALLOWED));
        assert_eq!(header(&response, headers::ALLOW_CREDENTIALS), Some("true"));
        assert_eq!(
            header(&response, headers::ALLOW_METHODS),
            Some("GET,HEAD,PUT,PATCH,POST,DELETE")
        );
        assert_eq!(
            header(&response, headers::ALLOW_HEADERS),
            Some("content-type, x-custom")
        );
    }

    #[tokio::test]
    async fn test_preflight_disallowed_origin() {
        let cors = cors();
        let mut ctx = preflight("https://evil.example", "POST", None);

        let StageOutcome::Fail(err) = cors.process(&mut ctx).await else {
            panic!("expected failure");
        };
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_preflight_disallowed_method() {
        let cors = CorsStage::builder()
            .allow_origin(ALLOWED)
            .allow_methods([Method::GET])
            .build();
        let mut ctx = preflight(ALLOWED, "DELETE", None);
        assert!(matches!(cors.process(&mut ctx).await, StageOutcome::Fail(_)));
    }

    #[tokio::test]
    async fn test_preflight_disallowed_header() {
        let cors = CorsStage::builder()
            .allow_origin(ALLOWED)
            .allow_headers(["Content-Type"])
            .build();

        let mut ok = preflight(ALLOWED, "GET", Some("Content-Type"));
        assert!(matches!(cors.process(&mut ok).await, StageOutcome::Respond(_)));

        let mut rejected = preflight(ALLOWED, "GET", Some("content-type, x-secret"));
        assert!(matches!(cors.process(&mut rejected).await, StageOutcome::Fail(_)));
    }

    #[tokio::test]
    async fn test_options_without_request_method_is_not_preflight() {
        let cors = cors();
        let mut ctx = RequestContext::builder()
            .method(Method::OPTIONS)
            .header(headers::ORIGIN, ALLOWED)
            .build();
        assert!(cors.process(&mut ctx).await.is_continue());
    }

    #[tokio::test]
    async fn test_simple_request_is_never_blocked() {
        let cors = cors();
        let mut ctx = simple("https://evil.example");
        assert!(cors.process(&mut ctx).await.is_continue());
    }

    #[test]
    fn test_on_response_allowed_origin() {
        let cors = cors();
        let ctx = simple(ALLOWED);
        let mut response = Response::empty(StatusCode::OK);

        cors.on_response(&ctx, &mut response);
        assert_eq!(header(&response, headers::ALLOW_ORIGIN), Some(ALLOWED));
        assert_eq!(header(&response, headers::ALLOW_CREDENTIALS), Some("true"));
        assert_eq!(header(&response, headers::EXPOSE_HEADERS), Some("x-request-id"));
        assert_eq!(header(&response, headers::VARY), Some("Origin"));
    }

    #[test]
    fn test_on_response_disallowed_origin_only_varies() {
        let cors = cors();
        let ctx = simple("https://evil.example");
        let mut response = Response::empty(StatusCode::OK);

        cors.on_response(&ctx, &mut response);
        assert_eq!(header(&response, headers::ALLOW_ORIGIN), None);
        assert_eq!(header(&response, headers::ALLOW_CREDENTIALS), None);
        assert_eq!(header(&response, headers::EXPOSE_HEADERS), None);
        assert_eq!(header(&response, headers::VARY), Some("Origin"));
        assert_eq!(response.headers().len(), 1);
    }

    #[test]
    fn test_vary_keeps_existing_values() {
        let cors = cors();
        let ctx = simple(ALLOWED);
        let mut response = Response::empty(StatusCode::OK);
        response
            .headers_mut()
            .insert(headers::VARY, HeaderValue::from_static("Accept-Encoding"));

        cors.on_response(&ctx, &mut response);
        assert_eq!(header(&response, headers::VARY), Some("Accept-Encoding, Origin"));

        cors.on_response(&simple("https://evil.example"), &mut response);
        assert_eq!(header(&response, headers::VARY), Some("Accept-Encoding, Origin"));
    }

    #[test]
    fn test_wildcard_origin_does_not_vary() {
        let cors = CorsStage::builder().allow_any_origin().build();
        let mut response = Response::empty(StatusCode::OK);

        cors.on_response(&simple("https://anyone.example"), &mut response);
        assert_eq!(header(&response, headers::ALLOW_ORIGIN), Some("*"));
        assert_eq!(header(&response, headers::VARY), None);
    }

    #[test]
    fn test_credentials_header_only_when_enabled() {
        let cors = CorsStage::builder()
            .allow_origin(ALLOWED)
            .allow_credentials(false)
            .build();
        let ctx = simple(ALLOWED);
        let mut response = Response::empty(StatusCode::OK);

        cors.on_response(&ctx, &mut response);
        assert_eq!(header(&response, headers::ALLOW_ORIGIN), Some(ALLOWED));
        assert!(header(&response, headers::ALLOW_CREDENTIALS).is_none());
    }

    #[test]
    fn test_max_age() {
        let cors = CorsStage::builder()
            .allow_origin(ALLOWED)
            .max_age(Duration::from_secs(600))
            .build();
        let response = cors.preflight_response(ALLOWED, "");
        assert_eq!(header(&response, headers::MAX_AGE), Some("600"));
        assert!(header(&response, headers::ALLOW_HEADERS).is_none());
    }
}
