//! Authorization endpoint flow: request validation, user authentication,
//! and authorization code issuance.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};
use url::Url;

use crate::audit::{AuditEvent, AuditKind, AuditSink};
use crate::authn::AuthHandler;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::oauth::authorize::{
    AuthorizeRequest, AuthorizeResponse, error_redirect_url, validate_scope,
};
use crate::oauth::code::{AuthorizationCode, generate_code};
use crate::oauth::pkce::CodeChallengeMethod;
use crate::storage::{ClientStorage, CodeStorage};
use crate::types::{Client, GrantType};

/// How an authorization request failed.
///
/// Per RFC 6749 §4.1.2.1, errors found before the redirect URI has been
/// validated must not redirect; everything after goes back to the client
/// via the redirect URI with `state` preserved.
#[derive(Debug)]
pub enum AuthorizeError {
    /// Respond directly; the redirect target cannot be trusted.
    Direct(AuthError),
    /// Send the user to `url`, which carries `error`/`error_description`.
    Redirect {
        /// Full redirect URL including the error parameters.
        url: Url,
        /// The underlying error, for logging.
        error: AuthError,
    },
}

impl From<AuthError> for AuthorizeError {
    fn from(error: AuthError) -> Self {
        Self::Direct(error)
    }
}

/// What the login form needs to render for a GET /authorize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginPageContext {
    /// Display name of the requesting client.
    pub client_name: String,
    /// Where the user will land afterwards.
    pub redirect_uri: String,
    /// Client state to thread through the form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Requested scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Ways the user may identify themselves.
    pub login_options: Vec<String>,
    /// Human-readable prompt for the form.
    pub message: String,
}

/// Validates authorization requests and issues authorization codes.
pub struct AuthorizationService {
    clients: Arc<dyn ClientStorage>,
    codes: Arc<dyn CodeStorage>,
    auth: AuthHandler,
    audit: Arc<dyn AuditSink>,
    config: AuthConfig,
}

impl AuthorizationService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        clients: Arc<dyn ClientStorage>,
        codes: Arc<dyn CodeStorage>,
        auth: AuthHandler,
        audit: Arc<dyn AuditSink>,
        config: AuthConfig,
    ) -> Self {
        Self {
            clients,
            codes,
            auth,
            audit,
            config,
        }
    }

    /// Validates the identity-independent parts of an authorization
    /// request: client, redirect URI, response type, scope, and PKCE
    /// pairing. Returns the client and the resolved redirect URI.
    pub async fn validate(
        &self,
        request: &AuthorizeRequest,
    ) -> Result<(Client, String), AuthorizeError> {
        // 1. The client must exist. No redirect target is trusted yet.
        let client_id = request
            .client_id
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("client_id is required"))?;
        let client = self
            .clients
            .find_by_client_id(client_id)
            .await?
            .ok_or_else(|| AuthError::invalid_client(format!("unknown client: {client_id}")))?;

        // 2. The redirect URI must match a registration. A client with
        //    exactly one registered URI may omit the parameter.
        let redirect_uri = match request.redirect_uri.as_deref() {
            Some(uri) => {
                if !client.redirect_uri_matches(uri) {
                    return Err(AuthorizeError::Direct(AuthError::invalid_request(
                        "redirect_uri does not match a registered URI",
                    )));
                }
                uri.to_string()
            }
            None => match client.redirect_uris.as_slice() {
                [only] => only.clone(),
                _ => {
                    return Err(AuthorizeError::Direct(AuthError::invalid_request(
                        "redirect_uri is required",
                    )));
                }
            },
        };

        // Everything below may redirect: the target has been validated.

        // 3. Only the code flow is supported.
        if request.response_type.as_deref() != Some("code") {
            let response_type = request.response_type.clone().unwrap_or_default();
            return Err(self.redirect_error(
                &redirect_uri,
                AuthError::unsupported_response_type(response_type),
                request.state.as_deref(),
            ));
        }

        // 4. The client must be allowed to use the code grant.
        if !client.supports_grant(GrantType::AuthorizationCode) {
            return Err(self.redirect_error_with_code(
                &redirect_uri,
                "unauthorized_client",
                AuthError::unauthorized("client may not use the authorization code grant"),
                request.state.as_deref(),
            ));
        }

        // 5. Scope, when present, must be well formed and allowed.
        if let Some(scope) = request.scope.as_deref() {
            if let Err(e) = validate_scope(scope) {
                return Err(self.redirect_error(&redirect_uri, e, request.state.as_deref()));
            }
            for token in scope.split(' ') {
                if !client.allows_scope(token) {
                    return Err(self.redirect_error(
                        &redirect_uri,
                        AuthError::invalid_scope(format!("scope not allowed: {token}")),
                        request.state.as_deref(),
                    ));
                }
            }
        }

        // 6. PKCE parameters come as a pair, with a known method.
        match (
            request.code_challenge.as_deref(),
            request.code_challenge_method.as_deref(),
        ) {
            (Some(_), Some(method)) => {
                if let Err(e) = CodeChallengeMethod::parse(method) {
                    return Err(self.redirect_error(&redirect_uri, e, request.state.as_deref()));
                }
            }
            (None, None) => {}
            _ => {
                return Err(self.redirect_error(
                    &redirect_uri,
                    AuthError::invalid_request(
                        "code_challenge and code_challenge_method must be sent together",
                    ),
                    request.state.as_deref(),
                ));
            }
        }

        Ok((client, redirect_uri))
    }

    /// Builds the login-form context for GET /authorize.
    pub async fn begin(
        &self,
        request: &AuthorizeRequest,
    ) -> Result<LoginPageContext, AuthorizeError> {
        let (client, redirect_uri) = self.validate(request).await?;
        Ok(LoginPageContext {
            message: format!("Sign in to continue to {}", client.name),
            client_name: client.name,
            redirect_uri,
            state: request.state.clone(),
            scope: request.scope.clone(),
            login_options: vec!["identifier".to_string(), "anonymous".to_string()],
        })
    }

    /// Handles a submitted consent form: authenticates the identifier and
    /// issues an authorization code bound to the request.
    pub async fn authorize(
        &self,
        request: &AuthorizeRequest,
    ) -> Result<AuthorizeResponse, AuthorizeError> {
        let (client, redirect_uri) = self.validate(request).await?;

        let identifier = request.identifier.as_deref().unwrap_or_default();
        let user = match self.auth.authenticate(identifier).await {
            Ok(user) => user,
            Err(e) if e.is_client_error() => {
                return Err(self.redirect_error_with_code(
                    &redirect_uri,
                    "access_denied",
                    e,
                    request.state.as_deref(),
                ));
            }
            Err(e) => return Err(AuthorizeError::Direct(e)),
        };

        self.audit
            .append(
                AuditEvent::new(AuditKind::Login)
                    .with_client(&client.client_id)
                    .with_user(&user.id),
            )
            .await;

        let method = match request.code_challenge_method.as_deref() {
            // validate() already checked the value parses.
            Some(value) => CodeChallengeMethod::parse(value).ok(),
            None => None,
        };

        let now = OffsetDateTime::now_utc();
        let code = AuthorizationCode {
            code: generate_code(),
            client_id: client.client_id.clone(),
            user_id: user.id.clone(),
            redirect_uri: redirect_uri.clone(),
            scope: request.scope.clone(),
            nonce: request.nonce.clone(),
            code_challenge: request.code_challenge.clone(),
            code_challenge_method: method,
            created_at: now,
            expires_at: now + self.config.tokens.authorization_code_lifetime,
        };
        self.codes.put(code.clone()).await.map_err(AuthorizeError::Direct)?;

        info!(client_id = %client.client_id, "issued authorization code");
        debug!(user_id = %user.id, "code bound to user");

        Ok(AuthorizeResponse {
            code: code.code,
            state: request.state.clone(),
            redirect_uri,
        })
    }

    fn redirect_error(
        &self,
        redirect_uri: &str,
        error: AuthError,
        state: Option<&str>,
    ) -> AuthorizeError {
        self.redirect_error_with_code(redirect_uri, error.oauth_error_code(), error, state)
    }

    fn redirect_error_with_code(
        &self,
        redirect_uri: &str,
        code: &str,
        error: AuthError,
        state: Option<&str>,
    ) -> AuthorizeError {
        match error_redirect_url(redirect_uri, code, &error.to_string(), state) {
            Ok(url) => AuthorizeError::Redirect { url, error },
            // The URI validated moments ago; failing to build the redirect
            // means something deeper is wrong.
            Err(_) => AuthorizeError::Direct(error),
        }
    }
}
