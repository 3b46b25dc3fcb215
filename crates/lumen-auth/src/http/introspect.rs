//! The introspection endpoint (RFC 7662).

use std::sync::Arc;

use axum::Form;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::http::token::{authenticate_client, extract_client_auth, token_error_response};
use crate::oauth::token::TokenRequest;
use crate::storage::ClientStorage;
use crate::token::TokenService;
use crate::token::introspection::IntrospectionRequest;

/// State for the introspection endpoint.
#[derive(Clone)]
pub struct IntrospectEndpointState {
    /// Store-backed token views.
    pub tokens: Arc<TokenService>,
    /// Client registry for authentication.
    pub clients: Arc<dyn ClientStorage>,
}

/// POST /introspect. Client authentication is required so random callers
/// cannot probe token validity; after that, unknown tokens are simply
/// `{"active": false}`.
pub async fn introspect(
    State(state): State<IntrospectEndpointState>,
    headers: HeaderMap,
    Form(request): Form<IntrospectionForm>,
) -> Response {
    let auth = extract_client_auth(
        &headers,
        &TokenRequest {
            client_id: request.client_id.clone(),
            client_secret: request.client_secret.clone(),
            ..Default::default()
        },
    );
    let client = match authenticate_client(&state.clients, auth).await {
        Ok(client) => client,
        Err(e) => return token_error_response(&e),
    };
    debug!(client_id = %client.client_id, "introspection request");

    match state.tokens.introspect(&request.token).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => token_error_response(&e),
    }
}

/// Introspection form including optional body client credentials.
#[derive(Debug, serde::Deserialize)]
pub struct IntrospectionForm {
    /// The token to introspect.
    pub token: String,
    /// Hint, accepted and ignored.
    #[serde(default)]
    pub token_type_hint: Option<String>,
    /// Client id, when authenticating in the body.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Client secret, when authenticating in the body.
    #[serde(default)]
    pub client_secret: Option<String>,
}

impl From<IntrospectionForm> for IntrospectionRequest {
    fn from(form: IntrospectionForm) -> Self {
        Self {
            token: form.token,
            token_type_hint: form.token_type_hint,
        }
    }
}
