//! HTTP surface: axum handlers for the OAuth/OIDC endpoints.
//!
//! Each endpoint module carries its own `State` struct so handlers only
//! see the services they need. [`router`] wires the full surface.

pub mod authorize;
pub mod introspect;
pub mod jwks;
pub mod logout;
pub mod token;
pub mod userinfo;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::oauth::AuthorizationService;
use crate::storage::ClientStorage;
use crate::token::jwt::KeyManager;
use crate::token::{OidcTokenService, TokenService};

/// Everything the HTTP surface needs.
#[derive(Clone)]
pub struct HttpServices {
    /// Authorization endpoint flow.
    pub authorization: Arc<AuthorizationService>,
    /// Token issuance, introspection, revocation.
    pub tokens: Arc<TokenService>,
    /// Client registry, for client authentication.
    pub clients: Arc<dyn ClientStorage>,
    /// Signing keys, for JWKS.
    pub keys: Arc<KeyManager>,
    /// ID token handling, for logout.
    pub oidc: Arc<OidcTokenService>,
}

/// Builds the router for the full endpoint surface.
pub fn router(services: HttpServices) -> Router {
    let token_state = token::TokenEndpointState {
        tokens: Arc::clone(&services.tokens),
        clients: Arc::clone(&services.clients),
    };
    let introspect_state = introspect::IntrospectEndpointState {
        tokens: Arc::clone(&services.tokens),
        clients: Arc::clone(&services.clients),
    };
    let logout_state = logout::LogoutEndpointState {
        tokens: Arc::clone(&services.tokens),
        oidc: Arc::clone(&services.oidc),
        clients: Arc::clone(&services.clients),
    };

    Router::new()
        .route(
            "/authorize",
            get(authorize::login_page).post(authorize::submit),
        )
        .with_state(authorize::AuthorizeEndpointState {
            authorization: Arc::clone(&services.authorization),
        })
        .merge(
            Router::new()
                .route("/token", post(token::token))
                .route("/revoke", post(token::revoke))
                .with_state(token_state),
        )
        .merge(
            Router::new()
                .route("/introspect", post(introspect::introspect))
                .with_state(introspect_state),
        )
        .merge(
            Router::new()
                .route("/.well-known/jwks.json", get(jwks::jwks))
                .with_state(jwks::JwksEndpointState {
                    keys: Arc::clone(&services.keys),
                }),
        )
        .merge(
            Router::new()
                .route("/userinfo", get(userinfo::userinfo))
                .with_state(userinfo::UserInfoEndpointState {
                    tokens: Arc::clone(&services.tokens),
                }),
        )
        .merge(
            Router::new()
                .route("/backchannel-logout", post(logout::backchannel_logout))
                .route("/end-session", get(logout::end_session))
                .with_state(logout_state),
        )
}
