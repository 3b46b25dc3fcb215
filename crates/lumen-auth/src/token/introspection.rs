//! Token introspection wire types (RFC 7662).

use serde::{Deserialize, Serialize};

use crate::types::IssuedToken;

/// Form parameters of an introspection request.
#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectionRequest {
    /// The token to introspect.
    pub token: String,

    /// Hint about the token type. Accepted and ignored; both stores are
    /// consulted regardless.
    #[serde(default)]
    pub token_type_hint: Option<String>,
}

/// Introspection response (RFC 7662 §2.2).
///
/// An inactive token yields `{"active": false}` with every other field
/// omitted, revealing nothing about why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    /// Whether the token is currently live.
    pub active: bool,

    /// Granted scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Client the token was issued to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Token type, `Bearer` for live tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Expiry, seconds since the epoch. Taken from the store record, which
    /// is authoritative over the token's own claims.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued-at, seconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Subject the token was issued for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

impl IntrospectionResponse {
    /// The response for any token that is unknown, expired, or revoked.
    #[must_use]
    pub fn inactive() -> Self {
        Self {
            active: false,
            scope: None,
            client_id: None,
            token_type: None,
            exp: None,
            iat: None,
            sub: None,
        }
    }

    /// Builds an active response from a stored token record.
    #[must_use]
    pub fn active(token: &IssuedToken) -> Self {
        Self {
            active: true,
            scope: token.scope.clone(),
            client_id: Some(token.client_id.clone()),
            token_type: Some("Bearer".to_string()),
            exp: Some(token.expires_at.unix_timestamp()),
            iat: Some(token.issued_at.unix_timestamp()),
            sub: token
                .user_id
                .clone()
                .or_else(|| Some(token.client_id.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Duration, OffsetDateTime};

    #[test]
    fn test_inactive_omits_everything_else() {
        let json = serde_json::to_value(IntrospectionResponse::inactive()).unwrap();
        assert_eq!(json, serde_json::json!({"active": false}));
    }

    #[test]
    fn test_active_reflects_store_record() {
        let now = OffsetDateTime::now_utc();
        let token = IssuedToken {
            access_token: "at-1".to_string(),
            refresh_token: None,
            user_id: Some("u-1".to_string()),
            client_id: "app".to_string(),
            scope: Some("read write".to_string()),
            issued_at: now,
            expires_at: now + Duration::hours(1),
            refresh_expires_at: None,
        };
        let response = IntrospectionResponse::active(&token);
        assert!(response.active);
        assert_eq!(response.sub.as_deref(), Some("u-1"));
        assert_eq!(response.client_id.as_deref(), Some("app"));
        assert_eq!(response.scope.as_deref(), Some("read write"));
        assert_eq!(response.exp, Some((now + Duration::hours(1)).unix_timestamp()));
    }

    #[test]
    fn test_client_credentials_token_subject_is_client() {
        let now = OffsetDateTime::now_utc();
        let token = IssuedToken {
            access_token: "at-1".to_string(),
            refresh_token: None,
            user_id: None,
            client_id: "service".to_string(),
            scope: None,
            issued_at: now,
            expires_at: now + Duration::hours(1),
            refresh_expires_at: None,
        };
        let response = IntrospectionResponse::active(&token);
        assert_eq!(response.sub.as_deref(), Some("service"));
    }
}
