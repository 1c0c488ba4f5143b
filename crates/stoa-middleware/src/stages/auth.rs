//! Advisory authentication stage.
//!
//! Extracts credentials, asks the [`IdentityProvider`] to verify them within
//! a timeout, and attaches the resulting identity to the context. The stage
//! never terminates a request: anonymous, rejected and unverifiable callers
//! all continue, with the conclusion recorded as an [`AuthOutcome`].
//! Handlers that need a caller use `stoa_router::require_identity`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use stoa_config::IdentityConfig;
use stoa_core::{AuthOutcome, RequestContext};
use stoa_telemetry::metrics::{record_auth_outcome, record_identity_verify};

use crate::identity::{Credentials, IdentityProvider};
use crate::stage::{BoxFuture, Stage, StageOutcome};

/// Default provider timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Default session cookie name.
pub const DEFAULT_SESSION_COOKIE: &str = "__session";

/// Attaches a verified identity when one can be established.
#[derive(Clone)]
pub struct AuthStage {
    provider: Arc<dyn IdentityProvider>,
    timeout: Duration,
    session_cookie: String,
}

impl std::fmt::Debug for AuthStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthStage")
            .field("provider", &self.provider.name())
            .field("timeout", &self.timeout)
            .field("session_cookie", &self.session_cookie)
            .finish()
    }
}

impl AuthStage {
    /// Creates the stage with default timeout and cookie name.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            timeout: DEFAULT_TIMEOUT,
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
        }
    }

    /// Creates the stage from the `[identity]` configuration section.
    #[must_use]
    pub fn from_config(provider: Arc<dyn IdentityProvider>, config: &IdentityConfig) -> Self {
        Self::new(provider)
            .timeout(Duration::from_millis(config.timeout_ms))
            .session_cookie(config.session_cookie.clone())
    }

    /// Sets the provider timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the session cookie name.
    #[must_use]
    pub fn session_cookie(mut self, name: impl Into<String>) -> Self {
        self.session_cookie = name.into();
        self
    }

    async fn authenticate(&self, ctx: &mut RequestContext) -> AuthOutcome {
        if !self.provider.enabled() {
            return AuthOutcome::NotAttempted;
        }
        let Some(credentials) = Credentials::from_context(ctx, &self.session_cookie) else {
            return AuthOutcome::Missing;
        };

        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, self.provider.verify(&credentials)).await;
        record_identity_verify(self.provider.name(), started.elapsed());

        match result {
            Ok(Ok(Some(identity))) => {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    user_id = %identity.log_id(),
                    source = credentials.source(),
                    "Identity verified"
                );
                match ctx.attach_identity(identity) {
                    Ok(()) => AuthOutcome::Verified,
                    Err(e) => {
                        tracing::warn!(request_id = %ctx.request_id(), error = %e, "Identity not attached");
                        AuthOutcome::Rejected
                    }
                }
            }
            Ok(Ok(None)) => AuthOutcome::Rejected,
            Ok(Err(e)) => {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    provider = self.provider.name(),
                    error = %e,
                    "Identity provider failed"
                );
                AuthOutcome::Unavailable {
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    provider = self.provider.name(),
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "Identity provider timed out"
                );
                AuthOutcome::Unavailable {
                    reason: format!("timed out after {:?}", self.timeout),
                }
            }
        }
    }
}

impl Stage for AuthStage {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn process<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StageOutcome> {
        Box::pin(async move {
            let outcome = self.authenticate(ctx).await;
            record_auth_outcome(outcome.as_str());
            ctx.set_auth_outcome(outcome);
            StageOutcome::Continue
        })
    }
}
