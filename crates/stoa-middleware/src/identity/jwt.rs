//! Local verification of signed session tokens.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use stoa_config::IdentityConfig;
use stoa_core::Identity;

use super::{Credentials, IdentityError, IdentityProvider};
use crate::stage::BoxFuture;

/// Claims read from a session token.
#[derive(Debug, Deserialize)]
struct SessionClaims {
    sub: String,
    #[serde(default)]
    sid: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    azp: Option<String>,
}

/// Verifies session tokens against a configured key.
///
/// `exp` is required and `nbf` is checked when present. An issuer, when
/// configured, must match `iss`. When authorized parties are configured, a
/// token carrying `azp` must name one of them.
///
/// # Example
///
/// ```
/// use stoa_middleware::identity::JwtIdentityProvider;
///
/// let provider = JwtIdentityProvider::new("shared-secret", "HS256", None, Vec::new());
/// assert!(provider.is_ok());
///
/// let provider = JwtIdentityProvider::new("not a pem", "RS256", None, Vec::new());
/// assert!(provider.is_err());
/// ```
pub struct JwtIdentityProvider {
    key: DecodingKey,
    validation: Validation,
    authorized_parties: Vec<String>,
}

impl std::fmt::Debug for JwtIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIdentityProvider")
            .field("algorithms", &self.validation.algorithms)
            .field("authorized_parties", &self.authorized_parties)
            .finish_non_exhaustive()
    }
}

impl JwtIdentityProvider {
    /// Creates a provider.
    ///
    /// `key` is the shared secret for HMAC algorithms, or a PEM public key
    /// otherwise.
    pub fn new(
        key: &str,
        algorithm: &str,
        issuer: Option<&str>,
        authorized_parties: Vec<String>,
    ) -> Result<Self, IdentityError> {
        let algorithm: Algorithm = algorithm.to_uppercase().parse().map_err(|_| {
            IdentityError::Config(format!("unsupported algorithm '{algorithm}'"))
        })?;

        let key = decoding_key(key, algorithm)?;

        let mut validation = Validation::new(algorithm);
        validation.validate_nbf = true;
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }

        Ok(Self {
            key,
            validation,
            authorized_parties,
        })
    }

    /// Creates a provider from the `[identity]` configuration section.
    pub fn from_config(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let key = config
            .jwt_key
            .as_deref()
            .ok_or_else(|| IdentityError::Config("identity.jwt_key is not set".to_string()))?;
        Self::new(
            key,
            &config.jwt_algorithm,
            config.issuer.as_deref(),
            config.authorized_parties.clone(),
        )
    }

    /// Verifies `token`, returning the identity it carries.
    pub fn verify_token(&self, token: &str) -> Option<Identity> {
        let claims = match decode::<SessionClaims>(token, &self.key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!(error = %e, "Session token rejected");
                return None;
            }
        };

        if let Some(azp) = &claims.azp {
            if !self.authorized_parties.is_empty() && !self.authorized_parties.contains(azp) {
                tracing::debug!(azp = %azp, "Session token issued for an unauthorized party");
                return None;
            }
        }

        let mut identity = Identity::new(claims.sub);
        if let Some(sid) = claims.sid {
            identity = identity.with_session(sid);
        }
        if let Some(email) = claims.email {
            identity = identity.with_email(email);
        }
        if let Some(iss) = claims.iss {
            identity = identity.with_issuer(iss);
        }
        Some(
            claims
                .roles
                .into_iter()
                .fold(identity, |identity, role| identity.with_role(role)),
        )
    }
}

fn decoding_key(key: &str, algorithm: Algorithm) -> Result<DecodingKey, IdentityError> {
    let pem = key.as_bytes();
    let invalid = |e: jsonwebtoken::errors::Error| IdentityError::InvalidKey(e.to_string());
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(DecodingKey::from_secret(pem)),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem).map_err(invalid),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(pem).map_err(invalid),
        _ => DecodingKey::from_rsa_pem(pem).map_err(invalid),
    }
}

impl IdentityProvider for JwtIdentityProvider {
    fn name(&self) -> &'static str {
        "jwt"
    }

    fn verify<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<Option<Identity>, IdentityError>> {
        Box::pin(async move { Ok(self.verify_token(credentials.token())) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &str = "test-signing-secret";

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn mint(claims: &serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn provider() -> JwtIdentityProvider {
        JwtIdentityProvider::new(
            SECRET,
            "hs256",
            Some("https://issuer.example"),
            vec!["http://54.172.192.158".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token() {
        let token = mint(&json!({
            "sub": "user_123",
            "sid": "sess_1",
            "email": "ada@example.com",
            "roles": ["admin"],
            "iss": "https://issuer.example",
            "azp": "http://54.172.192.158",
            "exp": now() + 600,
        }));

        let identity = provider().verify_token(&token).unwrap();
        assert_eq!(identity.user_id, "user_123");
        assert_eq!(identity.session_id.as_deref(), Some("sess_1"));
        assert_eq!(identity.email.as_deref(), Some("ada@example.com"));
        assert!(identity.has_role("admin"));
    }

    #[test]
    fn test_expired_token() {
        let token = mint(&json!({
            "sub": "user_123",
            "iss": "https://issuer.example",
            "exp": now() - 3600,
        }));
        assert!(provider().verify_token(&token).is_none());
    }

    #[test]
    fn test_missing_exp() {
        let token = mint(&json!({ "sub": "user_123", "iss": "https://issuer.example" }));
        assert!(provider().verify_token(&token).is_none());
    }

    #[test]
    fn test_wrong_issuer() {
        let token = mint(&json!({
            "sub": "user_123",
            "iss": "https://evil.example",
            "exp": now() + 600,
        }));
        assert!(provider().verify_token(&token).is_none());
    }

    #[test]
    fn test_unauthorized_party() {
        let token = mint(&json!({
            "sub": "user_123",
            "iss": "https://issuer.example",
            "azp": "https://evil.example",
            "exp": now() + 600,
        }));
        assert!(provider().verify_token(&token).is_none());
    }

    #[test]
    fn test_wrong_signature() {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({ "sub": "user_123", "iss": "https://issuer.example", "exp": now() + 600 }),
            &EncodingKey::from_secret(b"another-secret"),
        )
        .unwrap();
        assert!(provider().verify_token(&token).is_none());
    }

    #[test]
    fn test_garbage_token() {
        assert!(provider().verify_token("not-a-jwt").is_none());
    }

    #[test]
    fn test_unsupported_algorithm() {
        let err = JwtIdentityProvider::new(SECRET, "none", None, Vec::new()).unwrap_err();
        assert!(matches!(err, IdentityError::Config(_)));
    }
}
