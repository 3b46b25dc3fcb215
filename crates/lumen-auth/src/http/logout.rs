//! Logout endpoints: OIDC back-channel logout and RP-initiated
//! end-session.

use std::sync::Arc;

use axum::Form;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use crate::oauth::token::ErrorResponse;
use crate::storage::ClientStorage;
use crate::token::{OidcTokenService, TokenService};

/// State for the logout endpoints.
#[derive(Clone)]
pub struct LogoutEndpointState {
    /// Token revocation.
    pub tokens: Arc<TokenService>,
    /// Logout-token and ID-token verification.
    pub oidc: Arc<OidcTokenService>,
    /// Client registry, for post-logout redirect validation.
    pub clients: Arc<dyn ClientStorage>,
}

/// Body of a back-channel logout request.
#[derive(Debug, Deserialize)]
pub struct BackchannelLogoutForm {
    /// The signed logout token.
    pub logout_token: String,
}

/// POST /backchannel-logout (OIDC Back-Channel Logout §2.5): verifies the
/// logout token and revokes every token held by its subject.
pub async fn backchannel_logout(
    State(state): State<LogoutEndpointState>,
    Form(form): Form<BackchannelLogoutForm>,
) -> Response {
    let claims = match state.oidc.verify_logout_token(&form.logout_token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(error = %e, "rejected back-channel logout token");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("invalid_request", e.to_string())),
            )
                .into_response();
        }
    };
    match state.tokens.revoke_all_for_user(&claims.sub).await {
        Ok(dropped) => {
            info!(dropped, "back-channel logout processed");
            StatusCode::OK.into_response()
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Query parameters of an end-session request (OIDC RP-Initiated Logout).
#[derive(Debug, Deserialize)]
pub struct EndSessionParams {
    /// ID token identifying who is logging out.
    #[serde(default)]
    pub id_token_hint: Option<String>,
    /// Where to send the user afterwards. Must be registered.
    #[serde(default)]
    pub post_logout_redirect_uri: Option<String>,
    /// Opaque client state appended to the post-logout redirect.
    #[serde(default)]
    pub state: Option<String>,
}

/// GET /end-session: revokes the hinted subject's tokens, then redirects
/// to the post-logout URI when the hinted client registered it.
pub async fn end_session(
    State(state): State<LogoutEndpointState>,
    Query(params): Query<EndSessionParams>,
) -> Response {
    let Some(hint) = params.id_token_hint.as_deref() else {
        // Nothing to revoke without a hint; still a successful logout.
        return (StatusCode::OK, Json(serde_json::json!({"logged_out": true}))).into_response();
    };

    let claims = match state.oidc.peek_id_token(hint) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(error = %e, "rejected id_token_hint");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("invalid_request", "invalid id_token_hint")),
            )
                .into_response();
        }
    };

    if state.tokens.revoke_all_for_user(&claims.sub).await.is_err() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    info!("end-session logout processed");

    if let Some(target) = params.post_logout_redirect_uri.as_deref()
        && redirect_registered(&state, &claims.aud, target).await
        && let Ok(url) = with_state(target, params.state.as_deref())
    {
        return Redirect::to(url.as_str()).into_response();
    }
    (StatusCode::OK, Json(serde_json::json!({"logged_out": true}))).into_response()
}

/// A post-logout redirect is honored only when the hinted client
/// registered a matching URI.
async fn redirect_registered(state: &LogoutEndpointState, client_id: &str, target: &str) -> bool {
    match state.clients.find_by_client_id(client_id).await {
        Ok(Some(client)) => client.redirect_uri_matches(target),
        _ => false,
    }
}

fn with_state(target: &str, state: Option<&str>) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(target)?;
    if let Some(state) = state {
        url.query_pairs_mut().append_pair("state", state);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_state_appends() {
        let url = with_state("https://app.example.com/bye", Some("xyz")).unwrap();
        assert!(url.query_pairs().any(|(k, v)| k == "state" && v == "xyz"));

        let url = with_state("https://app.example.com/bye", None).unwrap();
        assert!(url.query().is_none());
    }
}
