//! Authorization endpoint wire types and request validation helpers.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AuthError;

/// Query/form parameters of an authorization request (RFC 6749 §4.1.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    /// Must be `code`; the only response type the server supports.
    #[serde(default)]
    pub response_type: Option<String>,

    /// The requesting client.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Where to send the user after the decision.
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// Requested scope, space-separated.
    #[serde(default)]
    pub scope: Option<String>,

    /// Opaque client state, echoed back on the redirect.
    #[serde(default)]
    pub state: Option<String>,

    /// OIDC nonce, echoed into the ID token.
    #[serde(default)]
    pub nonce: Option<String>,

    /// PKCE code challenge.
    #[serde(default)]
    pub code_challenge: Option<String>,

    /// PKCE challenge method (`S256` or `plain`).
    #[serde(default)]
    pub code_challenge_method: Option<String>,

    /// Identifier of the authenticated user submitting the consent form.
    #[serde(default)]
    pub identifier: Option<String>,
}

/// Successful outcome of an authorization request: the redirect carrying
/// the code back to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    /// The issued authorization code.
    pub code: String,

    /// Client state echoed verbatim, when one was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// The validated redirect URI to send the user to.
    pub redirect_uri: String,
}

impl AuthorizeResponse {
    /// Builds the full redirect URL with `code` (and `state`) appended
    /// to the query string.
    pub fn redirect_url(&self) -> Result<Url, AuthError> {
        let mut url = Url::parse(&self.redirect_uri)
            .map_err(|_| AuthError::invalid_request("invalid redirect_uri"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("code", &self.code);
            if let Some(state) = &self.state {
                query.append_pair("state", state);
            }
        }
        Ok(url)
    }
}

/// Builds an error redirect URL per RFC 6749 §4.1.2.1, preserving `state`.
pub fn error_redirect_url(
    redirect_uri: &str,
    error_code: &str,
    description: &str,
    state: Option<&str>,
) -> Result<Url, AuthError> {
    let mut url = Url::parse(redirect_uri)
        .map_err(|_| AuthError::invalid_request("invalid redirect_uri"))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("error", error_code);
        if !description.is_empty() {
            query.append_pair("error_description", description);
        }
        if let Some(state) = state {
            query.append_pair("state", state);
        }
    }
    Ok(url)
}

/// Validates a scope string per RFC 6749 §3.3.
///
/// Scope is one or more tokens separated by single spaces. Consecutive
/// spaces produce an empty token and are rejected, as are leading and
/// trailing spaces. Token characters are restricted to `%x21 / %x23-5B /
/// %x5D-7E` (printable ASCII minus space, `"` and `\`).
pub fn validate_scope(scope: &str) -> Result<(), AuthError> {
    if scope.is_empty() {
        return Err(AuthError::invalid_scope("scope must not be empty"));
    }
    for token in scope.split(' ') {
        if token.is_empty() {
            return Err(AuthError::invalid_scope(
                "scope tokens must be separated by a single space",
            ));
        }
        if !token
            .bytes()
            .all(|b| b == 0x21 || (0x23..=0x5B).contains(&b) || (0x5D..=0x7E).contains(&b))
        {
            return Err(AuthError::invalid_scope(format!(
                "scope token contains invalid characters: {token}"
            )));
        }
    }
    Ok(())
}

/// Splits a validated scope string into its tokens.
#[must_use]
pub fn scope_tokens(scope: &str) -> Vec<&str> {
    scope.split(' ').filter(|t| !t.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_scope_accepts_single_token() {
        assert!(validate_scope("read").is_ok());
        assert!(validate_scope("openid").is_ok());
    }

    #[test]
    fn test_validate_scope_accepts_multiple_tokens() {
        assert!(validate_scope("read write").is_ok());
        assert!(validate_scope("openid profile email").is_ok());
    }

    #[test]
    fn test_validate_scope_rejects_double_space() {
        assert!(validate_scope("read  write").is_err());
    }

    #[test]
    fn test_validate_scope_rejects_edge_spaces() {
        assert!(validate_scope(" read").is_err());
        assert!(validate_scope("read ").is_err());
    }

    #[test]
    fn test_validate_scope_rejects_empty() {
        assert!(validate_scope("").is_err());
    }

    #[test]
    fn test_validate_scope_rejects_forbidden_characters() {
        assert!(validate_scope("re\"ad").is_err());
        assert!(validate_scope("re\\ad").is_err());
        assert!(validate_scope("re\u{e9}ad").is_err());
    }

    #[test]
    fn test_redirect_url_includes_code_and_state() {
        let response = AuthorizeResponse {
            code: "abc123".to_string(),
            state: Some("xyz".to_string()),
            redirect_uri: "https://app.example.com/cb".to_string(),
        };
        let url = response.redirect_url().unwrap();
        assert_eq!(url.host_str(), Some("app.example.com"));
        let pairs: Vec<_> = url.query_pairs().collect();
        assert!(pairs.iter().any(|(k, v)| k == "code" && v == "abc123"));
        assert!(pairs.iter().any(|(k, v)| k == "state" && v == "xyz"));
    }

    #[test]
    fn test_redirect_url_omits_absent_state() {
        let response = AuthorizeResponse {
            code: "abc123".to_string(),
            state: None,
            redirect_uri: "https://app.example.com/cb?existing=1".to_string(),
        };
        let url = response.redirect_url().unwrap();
        assert!(url.query_pairs().any(|(k, _)| k == "existing"));
        assert!(!url.query_pairs().any(|(k, _)| k == "state"));
    }

    #[test]
    fn test_error_redirect_preserves_state() {
        let url = error_redirect_url(
            "https://app.example.com/cb",
            "access_denied",
            "user declined",
            Some("xyz"),
        )
        .unwrap();
        let pairs: Vec<_> = url.query_pairs().collect();
        assert!(pairs.iter().any(|(k, v)| k == "error" && v == "access_denied"));
        assert!(pairs.iter().any(|(k, v)| k == "state" && v == "xyz"));
    }

    #[test]
    fn test_scope_tokens() {
        assert_eq!(scope_tokens("read write"), vec!["read", "write"]);
        assert_eq!(scope_tokens("openid"), vec!["openid"]);
    }
}
