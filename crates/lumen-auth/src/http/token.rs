//! The token endpoint (RFC 6749 §3.2) and the revocation endpoint
//! (RFC 7009): client authentication, grant dispatch, and the RFC error
//! envelope.

use std::sync::Arc;

use axum::Form;
use axum::Json;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CACHE_CONTROL, PRAGMA, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::oauth::token::{ErrorResponse, TokenRequest};
use crate::storage::ClientStorage;
use crate::token::TokenService;
use crate::token::revocation::RevocationRequest;
use crate::types::Client;

/// State for the token and revocation endpoints.
#[derive(Clone)]
pub struct TokenEndpointState {
    /// Grant processing.
    pub tokens: Arc<TokenService>,
    /// Client registry for authentication.
    pub clients: Arc<dyn ClientStorage>,
}

/// How the client presented its credentials.
#[derive(Debug, PartialEq, Eq)]
pub enum ClientAuth {
    /// HTTP Basic: `Authorization: Basic base64(id:secret)`.
    Basic {
        /// Decoded client id.
        client_id: String,
        /// Decoded client secret.
        client_secret: String,
    },
    /// Credentials in the form body.
    Body {
        /// `client_id` form field.
        client_id: String,
        /// `client_secret` form field.
        client_secret: String,
    },
    /// A public client: id only, no secret anywhere.
    Public {
        /// `client_id` form field.
        client_id: String,
    },
    /// No identification at all.
    None,
}

/// Pulls client credentials out of the Authorization header or the form
/// body. The header wins when both are present, per RFC 6749 §2.3.
pub fn extract_client_auth(headers: &HeaderMap, request: &TokenRequest) -> ClientAuth {
    if let Some(value) = headers.get(AUTHORIZATION)
        && let Ok(value) = value.to_str()
        && let Some(encoded) = value.strip_prefix("Basic ")
        && let Ok(decoded) = STANDARD.decode(encoded.trim())
        && let Ok(decoded) = String::from_utf8(decoded)
        && let Some((client_id, client_secret)) = decoded.split_once(':')
    {
        return ClientAuth::Basic {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        };
    }
    match (request.client_id.as_deref(), request.client_secret.as_deref()) {
        (Some(id), Some(secret)) => ClientAuth::Body {
            client_id: id.to_string(),
            client_secret: secret.to_string(),
        },
        (Some(id), None) => ClientAuth::Public {
            client_id: id.to_string(),
        },
        _ => ClientAuth::None,
    }
}

/// Resolves and authenticates the client behind a request.
///
/// Confidential clients must present a verifying secret; public clients
/// must present none.
pub async fn authenticate_client(
    clients: &Arc<dyn ClientStorage>,
    auth: ClientAuth,
) -> Result<Client, AuthError> {
    let (client_id, secret) = match auth {
        ClientAuth::Basic {
            client_id,
            client_secret,
        }
        | ClientAuth::Body {
            client_id,
            client_secret,
        } => (client_id, Some(client_secret)),
        ClientAuth::Public { client_id } => (client_id, None),
        ClientAuth::None => {
            return Err(AuthError::invalid_client("client authentication required"));
        }
    };

    let client = clients
        .find_by_client_id(&client_id)
        .await?
        .ok_or_else(|| AuthError::invalid_client("unknown client"))?;

    match (&client.client_secret_hash, secret) {
        (Some(_), Some(secret)) => {
            if !clients.verify_secret(&client_id, &secret).await? {
                warn!(client_id = %client_id, "client secret verification failed");
                return Err(AuthError::invalid_client("invalid client credentials"));
            }
        }
        (Some(_), None) => {
            return Err(AuthError::invalid_client("client secret required"));
        }
        (None, Some(_)) => {
            return Err(AuthError::invalid_client(
                "public client must not send a secret",
            ));
        }
        (None, None) => {}
    }
    Ok(client)
}

/// POST /token.
pub async fn token(
    State(state): State<TokenEndpointState>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> Response {
    let auth = extract_client_auth(&headers, &request);
    let client = match authenticate_client(&state.clients, auth).await {
        Ok(client) => client,
        Err(e) => return token_error_response(&e),
    };

    debug!(client_id = %client.client_id, grant_type = request.grant_type.as_deref().unwrap_or("-"), "token request");
    match state.tokens.grant(&client, &request).await {
        Ok(response) => {
            // Bearer tokens must not be cached anywhere (RFC 6749 §5.1).
            let mut http = (StatusCode::OK, Json(response)).into_response();
            let headers = http.headers_mut();
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
            http
        }
        Err(e) => token_error_response(&e),
    }
}

/// POST /revoke (RFC 7009). Always 200 for well-formed requests.
pub async fn revoke(
    State(state): State<TokenEndpointState>,
    headers: HeaderMap,
    Form(request): Form<RevocationRequest>,
) -> Response {
    // Revocation requires client authentication, but the outcome does not
    // reveal whether the token existed.
    let auth = extract_client_auth(
        &headers,
        &TokenRequest {
            client_id: request.client_id.clone(),
            client_secret: request.client_secret.clone(),
            ..Default::default()
        },
    );
    if let Err(e) = authenticate_client(&state.clients, auth).await {
        return token_error_response(&e);
    }
    match state.tokens.revoke(&request.token).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => token_error_response(&e),
    }
}

/// Maps an [`AuthError`] onto the RFC 6749 §5.2 wire shape.
pub fn token_error_response(error: &AuthError) -> Response {
    if error.is_server_error() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("server_error", "internal error")),
        )
            .into_response();
    }
    let body = ErrorResponse::new(error.oauth_error_code(), error.to_string());
    if matches!(error, AuthError::InvalidClient { .. }) {
        let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        response.headers_mut().insert(
            WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"token\""),
        );
        return response;
    }
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_header(id: &str, secret: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let encoded = STANDARD.encode(format!("{id}:{secret}"));
        headers.insert(
            AUTHORIZATION,
            format!("Basic {encoded}").parse().unwrap(),
        );
        headers
    }

    #[test]
    fn test_extract_basic() {
        let auth = extract_client_auth(&basic_header("app", "s3cret"), &TokenRequest::default());
        assert_eq!(
            auth,
            ClientAuth::Basic {
                client_id: "app".to_string(),
                client_secret: "s3cret".to_string(),
            }
        );
    }

    #[test]
    fn test_basic_wins_over_body() {
        let request = TokenRequest {
            client_id: Some("body-app".to_string()),
            client_secret: Some("body-secret".to_string()),
            ..Default::default()
        };
        let auth = extract_client_auth(&basic_header("app", "s3cret"), &request);
        assert!(matches!(auth, ClientAuth::Basic { client_id, .. } if client_id == "app"));
    }

    #[test]
    fn test_extract_body_and_public() {
        let request = TokenRequest {
            client_id: Some("app".to_string()),
            client_secret: Some("s3cret".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            extract_client_auth(&HeaderMap::new(), &request),
            ClientAuth::Body { .. }
        ));

        let request = TokenRequest {
            client_id: Some("spa".to_string()),
            ..Default::default()
        };
        assert_eq!(
            extract_client_auth(&HeaderMap::new(), &request),
            ClientAuth::Public {
                client_id: "spa".to_string()
            }
        );
    }

    #[test]
    fn test_extract_none() {
        assert_eq!(
            extract_client_auth(&HeaderMap::new(), &TokenRequest::default()),
            ClientAuth::None
        );
    }

    #[test]
    fn test_garbage_basic_header_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic !!!not-base64!!!".parse().unwrap());
        assert_eq!(
            extract_client_auth(&headers, &TokenRequest::default()),
            ClientAuth::None
        );
    }

    #[tokio::test]
    async fn test_authenticate_client_paths() {
        use crate::authn::hash_password;
        use crate::storage::InMemoryClientStorage;

        let clients = Arc::new(InMemoryClientStorage::new());
        clients
            .create(Client::confidential(
                "svc",
                "Service",
                hash_password("s3cret").unwrap(),
            ))
            .await
            .unwrap();
        clients.create(Client::public("spa", "SPA")).await.unwrap();
        let clients: Arc<dyn ClientStorage> = clients;

        // Confidential with good secret.
        assert!(
            authenticate_client(
                &clients,
                ClientAuth::Basic {
                    client_id: "svc".to_string(),
                    client_secret: "s3cret".to_string()
                }
            )
            .await
            .is_ok()
        );

        // Confidential with bad secret.
        assert!(
            authenticate_client(
                &clients,
                ClientAuth::Basic {
                    client_id: "svc".to_string(),
                    client_secret: "wrong".to_string()
                }
            )
            .await
            .is_err()
        );

        // Confidential with no secret.
        assert!(
            authenticate_client(
                &clients,
                ClientAuth::Public {
                    client_id: "svc".to_string()
                }
            )
            .await
            .is_err()
        );

        // Public with id only.
        assert!(
            authenticate_client(
                &clients,
                ClientAuth::Public {
                    client_id: "spa".to_string()
                }
            )
            .await
            .is_ok()
        );

        // Public sending a secret is suspicious.
        assert!(
            authenticate_client(
                &clients,
                ClientAuth::Body {
                    client_id: "spa".to_string(),
                    client_secret: "anything".to_string()
                }
            )
            .await
            .is_err()
        );

        // Nothing at all.
        assert!(authenticate_client(&clients, ClientAuth::None).await.is_err());
    }
}
