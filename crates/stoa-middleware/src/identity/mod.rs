//! Identity providers consulted by the auth stage.
//!
//! A provider turns presented [`Credentials`] into a verified [`Identity`]:
//!
//! | Provider                     | Mode       | Verification                          |
//! |------------------------------|------------|---------------------------------------|
//! | [`JwtIdentityProvider`]      | `jwt`      | Local signature check (`jsonwebtoken`) |
//! | [`RemoteIdentityProvider`]   | `remote`   | HTTP call to a verification endpoint  |
//! | [`DisabledIdentityProvider`] | `disabled` | None, every request is anonymous      |
//! | [`StaticIdentityProvider`]   | -          | Fixed token table (tests, local dev)  |
//!
//! `Ok(None)` means the credentials were checked and rejected. `Err` means the
//! provider could not give an answer at all.

mod jwt;
mod remote;

use std::collections::HashMap;
use std::sync::Arc;

use http::header;
use stoa_config::{IdentityConfig, IdentityMode};
use stoa_core::{Identity, RequestContext};
use thiserror::Error;

use crate::stage::BoxFuture;

pub use jwt::JwtIdentityProvider;
pub use remote::RemoteIdentityProvider;

/// Errors from identity providers.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Key material could not be loaded.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// The provider is misconfigured.
    #[error("identity provider misconfigured: {0}")]
    Config(String),

    /// The provider could not be reached or did not answer.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    /// The provider answered with something unusable.
    #[error("identity provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Credentials presented by a caller.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// A session token carried in a cookie.
    SessionCookie(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer([redacted])"),
            Self::SessionCookie(_) => f.write_str("SessionCookie([redacted])"),
        }
    }
}

impl Credentials {
    /// Returns the raw token.
    #[must_use]
    pub fn token(&self) -> &str {
        match self {
            Self::Bearer(token) | Self::SessionCookie(token) => token,
        }
    }

    /// Returns where the token came from.
    #[must_use]
    pub const fn source(&self) -> &'static str {
        match self {
            Self::Bearer(_) => "bearer",
            Self::SessionCookie(_) => "cookie",
        }
    }

    /// Extracts credentials from a request.
    ///
    /// A bearer token wins over the session cookie. Empty tokens count as
    /// absent.
    ///
    /// # Example
    ///
    /// ```
    /// use stoa_core::RequestContext;
    /// use stoa_middleware::identity::Credentials;
    ///
    /// let ctx = RequestContext::builder()
    ///     .header("cookie", "theme=dark; __session=abc")
    ///     .build();
    /// let credentials = Credentials::from_context(&ctx, "__session").unwrap();
    /// assert_eq!(credentials, Credentials::SessionCookie("abc".to_string()));
    /// ```
    #[must_use]
    pub fn from_context(ctx: &RequestContext, session_cookie: &str) -> Option<Self> {
        if let Some(token) = ctx
            .header(header::AUTHORIZATION.as_str())
            .and_then(bearer_token)
        {
            return Some(Self::Bearer(token.to_string()));
        }

        ctx.headers()
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|cookies| cookie_value(cookies, session_cookie))
            .map(|token| Self::SessionCookie(token.to_string()))
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn cookie_value<'a>(cookies: &'a str, name: &str) -> Option<&'a str> {
    cookies
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}

/// Verifies caller credentials.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Returns the provider name used for logs and metrics.
    fn name(&self) -> &'static str;

    /// Returns false when the provider never verifies anything.
    fn enabled(&self) -> bool {
        true
    }

    /// Verifies `credentials`.
    fn verify<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<Option<Identity>, IdentityError>>;
}

/// Builds the provider selected by `config.mode`.
pub fn provider_from_config(
    config: &IdentityConfig,
) -> Result<Arc<dyn IdentityProvider>, IdentityError> {
    let provider: Arc<dyn IdentityProvider> = match config.mode {
        IdentityMode::Disabled => Arc::new(DisabledIdentityProvider),
        IdentityMode::Jwt => Arc::new(JwtIdentityProvider::from_config(config)?),
        IdentityMode::Remote => Arc::new(RemoteIdentityProvider::from_config(config)?),
    };
    Ok(provider)
}

/// A provider that treats every request as anonymous.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledIdentityProvider;

impl IdentityProvider for DisabledIdentityProvider {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn enabled(&self) -> bool {
        false
    }

    fn verify<'a>(
        &'a self,
        _credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<Option<Identity>, IdentityError>> {
        Box::pin(async { Ok(None) })
    }
}

/// A provider backed by a fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, Identity>,
}

impl StaticIdentityProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `token` to `identity`.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    fn verify<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<Option<Identity>, IdentityError>> {
        Box::pin(async move { Ok(self.tokens.get(credentials.token()).cloned()) })
    }
}
