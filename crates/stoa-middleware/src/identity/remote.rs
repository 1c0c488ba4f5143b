//! Verification through a remote endpoint.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use stoa_config::IdentityConfig;
use stoa_core::Identity;

use super::{Credentials, IdentityError, IdentityProvider};
use crate::stage::BoxFuture;

#[derive(Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(alias = "sub")]
    user_id: String,
    #[serde(default, alias = "sid")]
    session_id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default, alias = "iss")]
    issuer: Option<String>,
}

impl From<VerifyResponse> for Identity {
    fn from(response: VerifyResponse) -> Self {
        let mut identity = Identity::new(response.user_id);
        if let Some(session_id) = response.session_id {
            identity = identity.with_session(session_id);
        }
        if let Some(email) = response.email {
            identity = identity.with_email(email);
        }
        if let Some(issuer) = response.issuer {
            identity = identity.with_issuer(issuer);
        }
        response
            .roles
            .into_iter()
            .fold(identity, |identity, role| identity.with_role(role))
    }
}

/// Delegates verification to an HTTP endpoint.
///
/// The token is POSTed as `{"token": "..."}` with the configured secret key
/// as a bearer token. A 200 answer carries the identity claims. 401, 403 and
/// 404 mean the token was rejected. Anything else is an outage.
#[derive(Clone)]
pub struct RemoteIdentityProvider {
    client: Client,
    verify_url: String,
    secret_key: String,
}

impl std::fmt::Debug for RemoteIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteIdentityProvider")
            .field("verify_url", &self.verify_url)
            .field("secret_key", &"[redacted]")
            .finish_non_exhaustive()
    }
}

impl RemoteIdentityProvider {
    /// Creates a provider with its own HTTP client.
    pub fn new(
        verify_url: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            verify_url: verify_url.into(),
            secret_key: secret_key.into(),
        })
    }

    /// Creates a provider from the `[identity]` configuration section.
    pub fn from_config(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let verify_url = config
            .verify_url
            .clone()
            .ok_or_else(|| IdentityError::Config("identity.verify_url is not set".to_string()))?;
        let secret_key = config
            .secret_key
            .clone()
            .ok_or_else(|| IdentityError::Config("identity.secret_key is not set".to_string()))?;
        Self::new(
            verify_url,
            secret_key,
            Duration::from_millis(config.timeout_ms),
        )
    }

    async fn call(&self, token: &str) -> Result<Option<Identity>, IdentityError> {
        let response = self
            .client
            .post(&self.verify_url)
            .bearer_auth(&self.secret_key)
            .json(&VerifyRequest { token })
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body: VerifyResponse = response
                    .json()
                    .await
                    .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;
                Ok(Some(body.into()))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(None),
            status => Err(IdentityError::Unavailable(format!(
                "verification endpoint returned {status}"
            ))),
        }
    }
}

impl IdentityProvider for RemoteIdentityProvider {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn verify<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<Option<Identity>, IdentityError>> {
        Box::pin(self.call(credentials.token()))
    }
}
