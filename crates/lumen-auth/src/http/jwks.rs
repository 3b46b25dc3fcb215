//! The JWKS endpoint (RFC 7517).

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::header::CACHE_CONTROL;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::token::jwt::KeyManager;

/// State for the JWKS endpoint.
#[derive(Clone)]
pub struct JwksEndpointState {
    /// Signing key ring.
    pub keys: Arc<KeyManager>,
}

/// GET /.well-known/jwks.json. Cached briefly so clients pick up a
/// rotation within minutes.
pub async fn jwks(State(state): State<JwksEndpointState>) -> Response {
    match state.keys.jwks() {
        Ok(set) => {
            let mut response = (StatusCode::OK, Json(set)).into_response();
            response.headers_mut().insert(
                CACHE_CONTROL,
                HeaderValue::from_static("public, max-age=300"),
            );
            response
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
