//! The authorization endpoint: GET serves login form metadata, POST takes
//! the submitted identifier and answers with the redirect URL.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Serialize;
use tracing::debug;

use crate::error::AuthError;
use crate::oauth::service::AuthorizeError;
use crate::oauth::{AuthorizationService, AuthorizeRequest};
use crate::oauth::token::ErrorResponse;

/// State for the authorization endpoint.
#[derive(Clone)]
pub struct AuthorizeEndpointState {
    /// The flow implementation.
    pub authorization: Arc<AuthorizationService>,
}

/// Body of a successful POST /authorize: the front-end performs the
/// redirect itself.
#[derive(Debug, Serialize)]
pub struct RedirectBody {
    /// Where to send the user agent, query string included.
    #[serde(rename = "redirectUrl")]
    pub redirect_url: String,
}

/// GET /authorize: validates the request and returns what the login form
/// needs to render.
pub async fn login_page(
    State(state): State<AuthorizeEndpointState>,
    Query(request): Query<AuthorizeRequest>,
) -> Response {
    match state.authorization.begin(&request).await {
        Ok(context) => (StatusCode::OK, Json(context)).into_response(),
        Err(e) => authorize_error_response(e),
    }
}

/// POST /authorize: authenticates the submitted identifier, issues a code,
/// and returns the redirect URL carrying it.
pub async fn submit(
    State(state): State<AuthorizeEndpointState>,
    Form(request): Form<AuthorizeRequest>,
) -> Response {
    match state.authorization.authorize(&request).await {
        Ok(response) => match response.redirect_url() {
            Ok(url) => (
                StatusCode::OK,
                Json(RedirectBody {
                    redirect_url: url.to_string(),
                }),
            )
                .into_response(),
            Err(e) => direct_error_response(&e),
        },
        Err(e) => authorize_error_response(e),
    }
}

/// Redirect-capable errors travel back inside a `redirectUrl` body, so the
/// front-end delivers them to the client exactly like a success. Errors
/// found before the redirect URI validated become plain JSON errors.
fn authorize_error_response(error: AuthorizeError) -> Response {
    match error {
        AuthorizeError::Redirect { url, error } => {
            debug!(error = %error, "authorization rejected, redirecting");
            (
                StatusCode::OK,
                Json(RedirectBody {
                    redirect_url: url.to_string(),
                }),
            )
                .into_response()
        }
        AuthorizeError::Direct(e) => direct_error_response(&e),
    }
}

fn direct_error_response(error: &AuthError) -> Response {
    let status = if error.is_server_error() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else if matches!(error, AuthError::InvalidClient { .. }) {
        StatusCode::UNAUTHORIZED
    } else {
        StatusCode::BAD_REQUEST
    };
    let body = if error.is_server_error() {
        // Internals stay inside.
        ErrorResponse::new("server_error", "internal error")
    } else {
        ErrorResponse::new(error.oauth_error_code(), error.to_string())
    };
    (status, Json(body)).into_response()
}
