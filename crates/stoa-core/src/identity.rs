//! Verified caller identity.
//!
//! An [`Identity`] only exists once an identity provider has accepted the
//! caller's credentials. Requests without one are simply unauthenticated;
//! there is no "anonymous" identity value.

use serde::{Deserialize, Serialize};

/// The caller identity produced by a successful credential verification.
///
/// # Example
///
/// ```
/// use stoa_core::Identity;
///
/// let identity = Identity::new("user_2abc").with_email("alice@example.com");
/// assert_eq!(identity.log_id(), "user:user_2abc");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Subject identifier issued by the provider.
    pub user_id: String,

    /// Provider session the credentials belong to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Primary email address, if the provider shares it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Roles or permissions granted by the provider.
    #[serde(default)]
    pub roles: Vec<String>,

    /// Token issuer, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl Identity {
    /// Creates an identity for the given subject with no extra claims.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: None,
            email: None,
            roles: Vec::new(),
            issuer: None,
        }
    }

    /// Sets the session id.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Adds a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Sets the issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Returns an identifier suitable for logs.
    ///
    /// Never contains tokens or email addresses.
    #[must_use]
    pub fn log_id(&self) -> String {
        format!("user:{}", self.user_id)
    }

    /// Returns true if the identity carries the given role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
