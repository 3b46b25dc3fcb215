//! Token endpoint wire types (RFC 6749 §4.1.3, §5.1, §5.2).

use serde::{Deserialize, Serialize};

/// Form parameters of a token request. Every field is optional on the wire;
/// each grant handler checks for the parameters it needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRequest {
    /// The grant being exercised.
    #[serde(default)]
    pub grant_type: Option<String>,

    /// Authorization code, for `authorization_code`.
    #[serde(default)]
    pub code: Option<String>,

    /// Redirect URI the code was issued against, for `authorization_code`.
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// Client id, when authenticating in the body.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Client secret, when authenticating in the body.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// PKCE code verifier, for `authorization_code`.
    #[serde(default)]
    pub code_verifier: Option<String>,

    /// Refresh token, for `refresh_token`.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Resource owner username, for `password`.
    #[serde(default)]
    pub username: Option<String>,

    /// Resource owner password, for `password`.
    #[serde(default)]
    pub password: Option<String>,

    /// Requested scope.
    #[serde(default)]
    pub scope: Option<String>,
}

/// Successful token response (RFC 6749 §5.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The issued access token.
    pub access_token: String,

    /// Always `Bearer`.
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: u64,

    /// Refresh token, for grants that issue one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// OIDC ID token, when `openid` scope was granted to a user flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Granted scope, when it differs from (or confirms) the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Creates a bearer token response.
    #[must_use]
    pub fn bearer(access_token: impl Into<String>, expires_in: u64) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            expires_in,
            refresh_token: None,
            id_token: None,
            scope: None,
        }
    }

    /// Attaches a refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Attaches an ID token.
    #[must_use]
    pub fn with_id_token(mut self, id_token: impl Into<String>) -> Self {
        self.id_token = Some(id_token.into());
        self
    }

    /// Attaches the granted scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// Error response body (RFC 6749 §5.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// One of the registered error codes.
    pub error: String,

    /// Human-readable detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl ErrorResponse {
    /// Creates an error response with a description.
    #[must_use]
    pub fn new(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            error_description: Some(description.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_request_deserializes_sparse_form() {
        let request: TokenRequest =
            serde_urlencoded::from_str("grant_type=client_credentials&scope=read").unwrap();
        assert_eq!(request.grant_type.as_deref(), Some("client_credentials"));
        assert_eq!(request.scope.as_deref(), Some("read"));
        assert!(request.code.is_none());
        assert!(request.username.is_none());
    }

    #[test]
    fn test_token_response_serialization() {
        let response = TokenResponse::bearer("at-123", 3600)
            .with_refresh_token("rt-456")
            .with_scope("read write");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["access_token"], "at-123");
        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["expires_in"], 3600);
        assert_eq!(json["refresh_token"], "rt-456");
        assert_eq!(json["scope"], "read write");
        // Absent optional fields stay out of the body entirely.
        assert!(json.get("id_token").is_none());
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse::new("invalid_grant", "authorization code expired");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"], "invalid_grant");
        assert_eq!(json["error_description"], "authorization code expired");
    }
}
