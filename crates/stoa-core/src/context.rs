//! Request context types.
//!
//! The [`RequestContext`] carries all per-request state through the pipeline
//! and into route handlers. It is created when the server accepts a request,
//! owned by exactly one pipeline run, and dropped once the response is sent.

use crate::error::StoaError;
use crate::identity::Identity;
use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

use crate::response::REQUEST_ID_HEADER;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, so ids sort by arrival in logs.
///
/// # Example
///
/// ```
/// use stoa_core::RequestId;
///
/// let id = RequestId::new();
/// assert_eq!(id.to_string().len(), 36);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The request body as collected by the server before the pipeline runs.
///
/// Collection failures are carried here instead of being answered by the
/// server, so the body parser can fail the request through the error handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawBody {
    /// The complete body.
    Bytes(Bytes),
    /// The body exceeded the configured limit and was discarded.
    TooLarge {
        /// The limit in bytes.
        limit: usize,
    },
    /// The body could not be read (client reset, timeout, invalid framing).
    Unreadable(String),
}

impl RawBody {
    /// An empty body.
    #[must_use]
    pub const fn empty() -> Self {
        Self::Bytes(Bytes::new())
    }

    /// Returns the body bytes if collection succeeded.
    #[must_use]
    pub const fn bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns true if the body was collected and has no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Bytes(bytes) if bytes.is_empty())
    }
}

impl Default for RawBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Bytes> for RawBody {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&'static str> for RawBody {
    fn from(s: &'static str) -> Self {
        Self::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

/// What the auth stage concluded about the caller's credentials.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthOutcome {
    /// The auth stage has not run (yet).
    #[default]
    NotAttempted,
    /// No credentials were presented.
    Missing,
    /// Credentials were verified and an identity is attached.
    Verified,
    /// The provider rejected the credentials.
    Rejected,
    /// The provider could not be consulted.
    Unavailable {
        /// Why verification failed (timeout, transport error, ...).
        reason: String,
    },
}

impl AuthOutcome {
    /// Returns a short label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotAttempted => "not_attempted",
            Self::Missing => "missing",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
            Self::Unavailable { .. } => "unavailable",
        }
    }
}

/// Errors from write-once context slots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// An identity is already attached to this request.
    #[error("an identity is already attached to this request")]
    IdentityAlreadyAttached,

    /// Another stage already produced the final response.
    #[error("request already terminated by stage '{stage}'")]
    AlreadyTerminated {
        /// The stage that terminated the request.
        stage: String,
    },
}

/// Per-request state that flows through the pipeline.
///
/// # Example
///
/// ```
/// use stoa_core::{Identity, RequestContext};
///
/// let mut ctx = RequestContext::builder()
///     .method(http::Method::GET)
///     .uri("/api/me")
///     .build();
///
/// assert!(ctx.identity().is_none());
/// ctx.attach_identity(Identity::new("user_1")).unwrap();
/// assert!(ctx.attach_identity(Identity::new("user_2")).is_err());
/// assert_eq!(ctx.identity().unwrap().user_id, "user_1");
/// ```
#[derive(Debug)]
pub struct RequestContext {
    request_id: RequestId,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    raw_body: RawBody,
    json_body: Option<serde_json::Value>,
    remote_addr: Option<SocketAddr>,
    identity: Option<Identity>,
    auth_outcome: AuthOutcome,
    route_params: HashMap<String, String>,
    terminal_stage: Option<String>,
    started_at: Instant,

    /// Type-erased data stored by stages or handlers.
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl RequestContext {
    /// Returns a builder for a context.
    #[must_use]
    pub fn builder() -> RequestContextBuilder {
        RequestContextBuilder::default()
    }

    /// Creates a context from the head of an HTTP request and its collected body.
    ///
    /// A valid UUID in the `x-request-id` header is reused as the request id;
    /// anything else gets a fresh one.
    #[must_use]
    pub fn from_parts(
        parts: http::request::Parts,
        body: RawBody,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        Self {
            request_id,
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            raw_body: body,
            json_body: None,
            remote_addr,
            identity: None,
            auth_outcome: AuthOutcome::NotAttempted,
            route_params: HashMap::new(),
            terminal_stage: None,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the request method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URI.
    #[must_use]
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Returns the request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the peer address, if known.
    #[must_use]
    pub const fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Returns the raw body.
    #[must_use]
    pub const fn raw_body(&self) -> &RawBody {
        &self.raw_body
    }

    /// Stores the decoded JSON body.
    pub fn set_json_body(&mut self, value: serde_json::Value) {
        self.json_body = Some(value);
    }

    /// Returns the decoded JSON body, if the request declared one.
    #[must_use]
    pub const fn json_body(&self) -> Option<&serde_json::Value> {
        self.json_body.as_ref()
    }

    /// Deserializes the decoded JSON body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, StoaError> {
        let value = self
            .json_body
            .as_ref()
            .ok_or_else(|| StoaError::malformed_input("request has no JSON body"))?;
        T::deserialize(value).map_err(|e| StoaError::malformed_input(e.to_string()))
    }

    /// Returns the attached identity, if the caller was authenticated.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Attaches the caller identity.
    ///
    /// The slot is write-once: a second call fails and leaves the first
    /// identity in place.
    pub fn attach_identity(&mut self, identity: Identity) -> Result<(), ContextError> {
        if self.identity.is_some() {
            return Err(ContextError::IdentityAlreadyAttached);
        }
        self.identity = Some(identity);
        Ok(())
    }

    /// Returns what the auth stage concluded.
    #[must_use]
    pub const fn auth_outcome(&self) -> &AuthOutcome {
        &self.auth_outcome
    }

    /// Records the auth stage's conclusion.
    pub fn set_auth_outcome(&mut self, outcome: AuthOutcome) {
        self.auth_outcome = outcome;
    }

    /// Replaces the captured route parameters.
    pub fn set_route_params(&mut self, params: HashMap<String, String>) {
        self.route_params = params;
    }

    /// Returns a captured route parameter.
    #[must_use]
    pub fn route_param(&self, name: &str) -> Option<&str> {
        self.route_params.get(name).map(String::as_str)
    }

    /// Returns all captured route parameters.
    #[must_use]
    pub const fn route_params(&self) -> &HashMap<String, String> {
        &self.route_params
    }

    /// Records which stage produced the final response.
    ///
    /// Only the first call succeeds.
    pub fn mark_terminal(&mut self, stage: &str) -> Result<(), ContextError> {
        if let Some(existing) = &self.terminal_stage {
            return Err(ContextError::AlreadyTerminated {
                stage: existing.clone(),
            });
        }
        self.terminal_stage = Some(stage.to_string());
        Ok(())
    }

    /// Returns the stage that produced the final response, once known.
    #[must_use]
    pub fn terminal_stage(&self) -> Option<&str> {
        self.terminal_stage.as_deref()
    }

    /// Returns when the request was accepted.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the request was accepted.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension value, replacing any previous one of the same type.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }
}

/// Builder for [`RequestContext`], mostly useful in tests.
#[derive(Debug, Default)]
pub struct RequestContextBuilder {
    method: Method,
    uri: Option<Uri>,
    headers: HeaderMap,
    body: RawBody,
    remote_addr: Option<SocketAddr>,
    request_id: Option<RequestId>,
}

impl RequestContextBuilder {
    /// Sets the method (default `GET`).
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the URI. Unparseable URIs fall back to `/`.
    #[must_use]
    pub fn uri(mut self, uri: &str) -> Self {
        self.uri = Some(uri.parse().unwrap_or_else(|_| Uri::from_static("/")));
        self
    }

    /// Adds a header. Invalid names or values are ignored.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            http::HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<RawBody>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the peer address.
    #[must_use]
    pub const fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Sets an explicit request id.
    #[must_use]
    pub const fn request_id(mut self, id: RequestId) -> Self {
        self.request_id = Some(id);
        self
    }

    /// Builds the context.
    #[must_use]
    pub fn build(self) -> RequestContext {
        RequestContext {
            request_id: self.request_id.unwrap_or_default(),
            method: self.method,
            uri: self.uri.unwrap_or_else(|| Uri::from_static("/")),
            headers: self.headers,
            raw_body: self.body,
            json_body: None,
            remote_addr: self.remote_addr,
            identity: None,
            auth_outcome: AuthOutcome::NotAttempted,
            route_params: HashMap::new(),
            terminal_stage: None,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }
}
