//! OpenID Connect ID tokens (OIDC Core §2, §3.1.3.7) and back-channel
//! logout tokens.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::token::jwt::{JwtError, KeyManager};
use crate::types::User;

/// The event URI that marks a logout token (OIDC Back-Channel Logout §2.4).
pub const BACKCHANNEL_LOGOUT_EVENT: &str = "http://schemas.openid.net/event/backchannel-logout";

/// Errors from ID token verification.
#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    /// A required claim is absent.
    #[error("Missing required claims: {0}")]
    MissingClaims(String),

    /// The `iss` claim does not match this server.
    #[error("Invalid issuer")]
    InvalidIssuer,

    /// The `aud` claim does not name the expected client.
    #[error("Invalid audience")]
    InvalidAudience,

    /// The `nonce` claim does not match the authorization request.
    #[error("Invalid nonce")]
    InvalidNonce,

    /// Signature or structural failure.
    #[error(transparent)]
    Jwt(#[from] JwtError),
}

/// Claims of an ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer URL.
    pub iss: String,
    /// Subject: the user id.
    pub sub: String,
    /// Audience: the client id.
    pub aud: String,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// When the user authenticated, seconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,
    /// Nonce from the authorization request, when one was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Authentication context class reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,
    /// Authentication method references.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amr: Option<Vec<String>>,
    /// Authorized party, when it differs from the audience.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,
    /// Email, when the user has one on record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name, when the user has one on record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Login name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
}

/// Raw claim view used during verification, so absence can be reported
/// claim by claim instead of as a deserialization error.
#[derive(Debug, Deserialize)]
struct RawIdClaims {
    iss: Option<String>,
    sub: Option<String>,
    aud: Option<String>,
    exp: Option<i64>,
    iat: Option<i64>,
    auth_time: Option<i64>,
    nonce: Option<String>,
    acr: Option<String>,
    amr: Option<Vec<String>>,
    azp: Option<String>,
    email: Option<String>,
    name: Option<String>,
    preferred_username: Option<String>,
}

/// Claims of a back-channel logout token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutTokenClaims {
    /// Issuer URL.
    pub iss: String,
    /// The user being logged out.
    pub sub: String,
    /// Audience: the client id.
    pub aud: String,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Unique token id.
    pub jti: String,
    /// Must contain [`BACKCHANNEL_LOGOUT_EVENT`].
    pub events: HashMap<String, serde_json::Value>,
}

/// Builds and verifies ID tokens.
pub struct OidcTokenService {
    keys: Arc<KeyManager>,
    issuer: String,
    id_token_lifetime: Duration,
}

impl OidcTokenService {
    /// Creates a service signing with the given key manager.
    #[must_use]
    pub fn new(keys: Arc<KeyManager>, issuer: impl Into<String>, id_token_lifetime: Duration) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            id_token_lifetime,
        }
    }

    /// Issues a signed ID token for a user authenticating through the
    /// given client.
    pub fn issue_id_token(
        &self,
        user: &User,
        client_id: &str,
        nonce: Option<&str>,
    ) -> Result<String, OidcError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = IdTokenClaims {
            iss: self.issuer.clone(),
            sub: user.id.clone(),
            aud: client_id.to_string(),
            exp: now + self.id_token_lifetime.as_secs() as i64,
            iat: now,
            auth_time: Some(now),
            nonce: nonce.map(str::to_string),
            acr: None,
            amr: None,
            azp: None,
            email: user.email.clone(),
            name: user.display_name.clone(),
            preferred_username: Some(user.username.clone()),
        };
        debug!(client_id = %client_id, "issuing ID token");
        Ok(self.keys.encode(&claims)?)
    }

    /// Verifies an ID token: signature, expiry, required claims, issuer,
    /// audience, and (when expected) nonce.
    pub fn verify_id_token(
        &self,
        token: &str,
        expected_audience: &str,
        expected_nonce: Option<&str>,
    ) -> Result<IdTokenClaims, OidcError> {
        let raw: RawIdClaims = self.keys.decode(token)?;

        let mut missing = Vec::new();
        if raw.iss.is_none() {
            missing.push("iss");
        }
        if raw.sub.is_none() {
            missing.push("sub");
        }
        if raw.aud.is_none() {
            missing.push("aud");
        }
        if raw.exp.is_none() {
            missing.push("exp");
        }
        if raw.iat.is_none() {
            missing.push("iat");
        }
        if !missing.is_empty() {
            return Err(OidcError::MissingClaims(missing.join(", ")));
        }

        let claims = IdTokenClaims {
            iss: raw.iss.unwrap_or_default(),
            sub: raw.sub.unwrap_or_default(),
            aud: raw.aud.unwrap_or_default(),
            exp: raw.exp.unwrap_or_default(),
            iat: raw.iat.unwrap_or_default(),
            auth_time: raw.auth_time,
            nonce: raw.nonce,
            acr: raw.acr,
            amr: raw.amr,
            azp: raw.azp,
            email: raw.email,
            name: raw.name,
            preferred_username: raw.preferred_username,
        };

        if claims.iss != self.issuer {
            return Err(OidcError::InvalidIssuer);
        }
        if claims.aud != expected_audience {
            return Err(OidcError::InvalidAudience);
        }
        if let Some(expected) = expected_nonce {
            if claims.nonce.as_deref() != Some(expected) {
                return Err(OidcError::InvalidNonce);
            }
        }
        Ok(claims)
    }

    /// Reads an `id_token_hint`: signature and issuer are checked, but
    /// expiry, audience, and nonce are not. The token only identifies who
    /// is logging out.
    pub fn peek_id_token(&self, token: &str) -> Result<IdTokenClaims, OidcError> {
        let raw: RawIdClaims = self.keys.decode_allow_expired(token)?;
        let Some(iss) = raw.iss else {
            return Err(OidcError::MissingClaims("iss".to_string()));
        };
        if iss != self.issuer {
            return Err(OidcError::InvalidIssuer);
        }
        let Some(sub) = raw.sub else {
            return Err(OidcError::MissingClaims("sub".to_string()));
        };
        Ok(IdTokenClaims {
            iss,
            sub,
            aud: raw.aud.unwrap_or_default(),
            exp: raw.exp.unwrap_or_default(),
            iat: raw.iat.unwrap_or_default(),
            auth_time: raw.auth_time,
            nonce: raw.nonce,
            acr: raw.acr,
            amr: raw.amr,
            azp: raw.azp,
            email: raw.email,
            name: raw.name,
            preferred_username: raw.preferred_username,
        })
    }

    /// Issues a back-channel logout token for a subject.
    pub fn issue_logout_token(&self, sub: &str, client_id: &str) -> Result<String, OidcError> {
        let mut events = HashMap::new();
        events.insert(
            BACKCHANNEL_LOGOUT_EVENT.to_string(),
            serde_json::Value::Object(serde_json::Map::new()),
        );
        let claims = LogoutTokenClaims {
            iss: self.issuer.clone(),
            sub: sub.to_string(),
            aud: client_id.to_string(),
            iat: OffsetDateTime::now_utc().unix_timestamp(),
            jti: Uuid::new_v4().to_string(),
            events,
        };
        Ok(self.keys.encode(&claims)?)
    }

    /// Verifies a back-channel logout token and returns the subject to
    /// log out.
    pub fn verify_logout_token(&self, token: &str) -> Result<LogoutTokenClaims, OidcError> {
        // Logout tokens carry no exp; liveness is the iat plus transport.
        let claims: LogoutTokenClaims = self.keys.decode_allow_expired(token)?;
        if claims.iss != self.issuer {
            return Err(OidcError::InvalidIssuer);
        }
        if !claims.events.contains_key(BACKCHANNEL_LOGOUT_EVENT) {
            return Err(OidcError::MissingClaims(format!(
                "events must contain {BACKCHANNEL_LOGOUT_EVENT}"
            )));
        }
        if claims.sub.is_empty() {
            return Err(OidcError::MissingClaims("sub".to_string()));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyConfig;

    const ISSUER: &str = "https://auth.example.com";

    fn service() -> OidcTokenService {
        let keys = Arc::new(KeyManager::generate(KeyConfig::default()).unwrap());
        OidcTokenService::new(keys, ISSUER, Duration::from_secs(3600))
    }

    fn alice() -> User {
        User::new("u-1", "alice")
            .with_email("alice@example.com")
            .with_display_name("Alice")
    }

    #[test]
    fn test_issue_and_verify_id_token() {
        let service = service();
        let token = service
            .issue_id_token(&alice(), "app", Some("nonce-1"))
            .unwrap();
        let claims = service
            .verify_id_token(&token, "app", Some("nonce-1"))
            .unwrap();
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.aud, "app");
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
        assert_eq!(claims.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_verify_rejects_wrong_audience() {
        let service = service();
        let token = service.issue_id_token(&alice(), "app", None).unwrap();
        let result = service.verify_id_token(&token, "other-app", None);
        assert!(matches!(result, Err(OidcError::InvalidAudience)));
    }

    #[test]
    fn test_verify_rejects_wrong_nonce() {
        let service = service();
        let token = service
            .issue_id_token(&alice(), "app", Some("nonce-1"))
            .unwrap();
        let result = service.verify_id_token(&token, "app", Some("nonce-2"));
        assert!(matches!(result, Err(OidcError::InvalidNonce)));
    }

    #[test]
    fn test_verify_rejects_missing_nonce_when_expected() {
        let service = service();
        let token = service.issue_id_token(&alice(), "app", None).unwrap();
        let result = service.verify_id_token(&token, "app", Some("nonce-1"));
        assert!(matches!(result, Err(OidcError::InvalidNonce)));
    }

    #[test]
    fn test_verify_rejects_wrong_issuer() {
        let keys = Arc::new(KeyManager::generate(KeyConfig::default()).unwrap());
        let issuing =
            OidcTokenService::new(Arc::clone(&keys), "https://other.example.com", Duration::from_secs(3600));
        let verifying = OidcTokenService::new(keys, ISSUER, Duration::from_secs(3600));

        let token = issuing.issue_id_token(&alice(), "app", None).unwrap();
        let result = verifying.verify_id_token(&token, "app", None);
        assert!(matches!(result, Err(OidcError::InvalidIssuer)));
    }

    #[test]
    fn test_verify_reports_missing_claims() {
        let service = service();
        // Sign a token lacking sub/aud with the same key ring.
        #[derive(Serialize)]
        struct Sparse {
            iss: String,
            exp: i64,
            iat: i64,
        }
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let token = service
            .keys
            .encode(&Sparse {
                iss: ISSUER.to_string(),
                exp: now + 3600,
                iat: now,
            })
            .unwrap();
        let result = service.verify_id_token(&token, "app", None);
        match result {
            Err(OidcError::MissingClaims(claims)) => {
                assert!(claims.contains("sub"));
                assert!(claims.contains("aud"));
            }
            other => panic!("expected MissingClaims, got {other:?}"),
        }
    }

    #[test]
    fn test_peek_ignores_audience() {
        let service = service();
        let token = service.issue_id_token(&alice(), "app", None).unwrap();
        let claims = service.peek_id_token(&token).unwrap();
        assert_eq!(claims.sub, "u-1");
        // No audience expectation when peeking.
        assert_eq!(claims.aud, "app");
    }

    #[test]
    fn test_logout_token_roundtrip() {
        let service = service();
        let token = service.issue_logout_token("u-1", "app").unwrap();
        let claims = service.verify_logout_token(&token).unwrap();
        assert_eq!(claims.sub, "u-1");
        assert!(claims.events.contains_key(BACKCHANNEL_LOGOUT_EVENT));
    }

    #[test]
    fn test_logout_token_rejects_plain_id_token() {
        let service = service();
        let token = service.issue_id_token(&alice(), "app", None).unwrap();
        assert!(service.verify_logout_token(&token).is_err());
    }
}
