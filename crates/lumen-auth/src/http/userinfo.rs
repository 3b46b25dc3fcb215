//! The UserInfo endpoint (OIDC Core §5.3).

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::token::TokenService;

/// State for the UserInfo endpoint.
#[derive(Clone)]
pub struct UserInfoEndpointState {
    /// Bearer-token verification and user lookup.
    pub tokens: Arc<TokenService>,
}

/// Claims returned for the token's subject.
#[derive(Debug, Serialize)]
pub struct UserInfoResponse {
    /// Stable subject identifier.
    pub sub: String,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Login name.
    pub preferred_username: String,
    /// Email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Pulls the bearer token out of the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// GET /userinfo.
pub async fn userinfo(
    State(state): State<UserInfoEndpointState>,
    headers: HeaderMap,
) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return unauthorized("invalid_request");
    };
    let record = match state.tokens.authenticate_bearer(token).await {
        Ok(record) => record,
        Err(_) => return unauthorized("invalid_token"),
    };
    match state.tokens.user_for_token(&record).await {
        Ok(user) => Json(UserInfoResponse {
            sub: user.id,
            name: user.display_name,
            preferred_username: user.username,
            email: user.email,
        })
        .into_response(),
        Err(_) => unauthorized("invalid_token"),
    }
}

fn unauthorized(error: &str) -> Response {
    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": error })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
