//! The grant-type state machine: turns authenticated token requests into
//! issued tokens, and handles introspection and revocation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditKind, AuditSink};
use crate::authn::AuthHandler;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::oauth::authorize::validate_scope;
use crate::oauth::code::generate_code;
use crate::oauth::pkce::verify_challenge;
use crate::oauth::token::{TokenRequest, TokenResponse};
use crate::storage::{CodeStorage, TokenStorage};
use crate::token::introspection::IntrospectionResponse;
use crate::token::jwt::{AccessClaims, KeyManager};
use crate::token::oidc::OidcTokenService;
use crate::types::user::ANONYMOUS_USER;
use crate::types::{Client, GrantType, IssuedToken, User};

/// Issues, introspects, and revokes tokens.
///
/// Every grant handler takes the client already authenticated by the HTTP
/// layer; this service never sees client secrets.
pub struct TokenService {
    codes: Arc<dyn CodeStorage>,
    tokens: Arc<dyn TokenStorage>,
    auth: AuthHandler,
    keys: Arc<KeyManager>,
    oidc: Arc<OidcTokenService>,
    audit: Arc<dyn AuditSink>,
    config: AuthConfig,
}

impl TokenService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        codes: Arc<dyn CodeStorage>,
        tokens: Arc<dyn TokenStorage>,
        auth: AuthHandler,
        keys: Arc<KeyManager>,
        oidc: Arc<OidcTokenService>,
        audit: Arc<dyn AuditSink>,
        config: AuthConfig,
    ) -> Self {
        Self {
            codes,
            tokens,
            auth,
            keys,
            oidc,
            audit,
            config,
        }
    }

    /// Dispatches a token request to the handler for its grant type.
    pub async fn grant(
        &self,
        client: &Client,
        request: &TokenRequest,
    ) -> Result<TokenResponse, AuthError> {
        let grant_type = request
            .grant_type
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("grant_type is required"))?;
        let grant_type = GrantType::parse(grant_type)?;

        if !client.supports_grant(grant_type) {
            return Err(AuthError::unauthorized(format!(
                "client may not use grant type {grant_type}"
            )));
        }

        match grant_type {
            GrantType::AuthorizationCode => self.exchange_code(client, request).await,
            GrantType::ClientCredentials => self.client_credentials(client, request).await,
            GrantType::Password => self.password(client, request).await,
            GrantType::RefreshToken => self.refresh(client, request).await,
        }
    }

    /// Authorization code grant (RFC 6749 §4.1.3).
    async fn exchange_code(
        &self,
        client: &Client,
        request: &TokenRequest,
    ) -> Result<TokenResponse, AuthError> {
        // 1. Required parameters.
        let code = request
            .code
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("code is required"))?;
        let redirect_uri = request
            .redirect_uri
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("redirect_uri is required"))?;

        // 2. Consume the code. The store removes it under the write lock,
        //    so a second redemption of the same code finds nothing.
        let record = self
            .codes
            .consume(code)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("authorization code is invalid or expired"))?;

        let now = OffsetDateTime::now_utc();
        if record.is_expired(now) {
            return Err(AuthError::invalid_grant("authorization code has expired"));
        }

        // 3. The code must belong to this client and this redirect URI.
        if record.client_id != client.client_id {
            warn!(client_id = %client.client_id, "authorization code presented by wrong client");
            return Err(AuthError::invalid_grant(
                "authorization code was issued to a different client",
            ));
        }
        if record.redirect_uri != redirect_uri {
            return Err(AuthError::invalid_grant("redirect_uri does not match"));
        }

        // 4. PKCE: a code issued with a challenge demands a verifier, and
        //    a code issued without one refuses a verifier.
        match (&record.code_challenge, record.code_challenge_method) {
            (Some(challenge), Some(method)) => {
                let verifier = request
                    .code_verifier
                    .as_deref()
                    .ok_or_else(|| AuthError::invalid_grant("code_verifier is required"))?;
                verify_challenge(verifier, challenge, method)?;
            }
            _ => {
                if request.code_verifier.is_some() {
                    return Err(AuthError::invalid_grant(
                        "code was not issued with a PKCE challenge",
                    ));
                }
            }
        }

        // 5. Resolve the user the code was bound to.
        let user = self.resolve_user(&record.user_id).await?;

        // 6. Mint the token pair.
        self.issue(client, Some(&user), record.scope.as_deref(), record.nonce.as_deref(), true)
            .await
    }

    /// Client credentials grant (RFC 6749 §4.4). No user, no refresh token.
    async fn client_credentials(
        &self,
        client: &Client,
        request: &TokenRequest,
    ) -> Result<TokenResponse, AuthError> {
        if client.is_public() {
            return Err(AuthError::invalid_client(
                "client_credentials requires a confidential client",
            ));
        }
        let scope = self.check_scope(client, request.scope.as_deref())?;
        self.issue(client, None, scope, None, false).await
    }

    /// Resource owner password grant (RFC 6749 §4.3).
    async fn password(
        &self,
        client: &Client,
        request: &TokenRequest,
    ) -> Result<TokenResponse, AuthError> {
        let username = request
            .username
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("username is required"))?;
        let password = request
            .password
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("password is required"))?;

        // Unknown user and wrong password produce the same error.
        let user = self
            .auth
            .authenticate_password(username, password)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("invalid username or password"))?;

        self.audit
            .append(
                AuditEvent::new(AuditKind::Login)
                    .with_client(&client.client_id)
                    .with_user(&user.id)
                    .with_detail("password"),
            )
            .await;

        let scope = self.check_scope(client, request.scope.as_deref())?;
        self.issue(client, Some(&user), scope, None, true).await
    }

    /// Refresh token grant (RFC 6749 §6) with rotation: the presented
    /// refresh token is retired and a new pair is minted.
    async fn refresh(
        &self,
        client: &Client,
        request: &TokenRequest,
    ) -> Result<TokenResponse, AuthError> {
        let refresh_token = request
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("refresh_token is required"))?;

        // The store removes the record under its write lock, so two
        // concurrent presentations of the same token have a single winner.
        let record = self
            .tokens
            .take_by_refresh_token(refresh_token)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("refresh token is invalid or expired"))?;

        if record.client_id != client.client_id {
            // The token stays retired.
            warn!(client_id = %client.client_id, "refresh token presented by wrong client");
            return Err(AuthError::invalid_grant(
                "refresh token was issued to a different client",
            ));
        }

        // Scope may narrow, never widen.
        let scope = match (request.scope.as_deref(), record.scope.as_deref()) {
            (None, original) => original.map(str::to_string),
            (Some(requested), Some(original)) => {
                validate_scope(requested)?;
                let requested_set: HashSet<&str> = requested.split(' ').collect();
                let original_set: HashSet<&str> = original.split(' ').collect();
                if !requested_set.is_subset(&original_set) {
                    return Err(AuthError::invalid_scope(
                        "requested scope exceeds the original grant",
                    ));
                }
                Some(requested.to_string())
            }
            (Some(_), None) => {
                return Err(AuthError::invalid_scope(
                    "requested scope exceeds the original grant",
                ));
            }
        };

        let user = match &record.user_id {
            Some(user_id) => Some(self.resolve_user(user_id).await?),
            None => None,
        };

        debug!(client_id = %client.client_id, "rotated refresh token");

        self.issue(client, user.as_ref(), scope.as_deref(), None, true)
            .await
    }

    /// Introspection (RFC 7662). The store is authoritative: a token that
    /// is absent, expired, or revoked there is inactive no matter what its
    /// signature says, and `exp` comes from the store record.
    pub async fn introspect(&self, token_value: &str) -> Result<IntrospectionResponse, AuthError> {
        if let Some(record) = self.tokens.find_by_access_token(token_value).await? {
            // The value must also be one of our signed tokens.
            if self
                .keys
                .decode_allow_expired::<AccessClaims>(token_value)
                .is_err()
            {
                return Ok(IntrospectionResponse::inactive());
            }
            return Ok(IntrospectionResponse::active(&record));
        }
        if let Some(record) = self.tokens.find_by_refresh_token(token_value).await? {
            return Ok(IntrospectionResponse::active(&record));
        }
        Ok(IntrospectionResponse::inactive())
    }

    /// Revocation (RFC 7009). Idempotent: unknown tokens revoke to the
    /// same end state as known ones.
    pub async fn revoke(&self, token_value: &str) -> Result<(), AuthError> {
        self.tokens.revoke_access_token(token_value).await?;
        self.tokens.revoke_refresh_token(token_value).await?;
        self.audit
            .append(AuditEvent::new(AuditKind::TokenRevoked))
            .await;
        Ok(())
    }

    /// Revokes every token held by a user. Used by logout.
    pub async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64, AuthError> {
        let dropped = self.tokens.revoke_all_for_user(user_id).await?;
        if dropped > 0 {
            self.audit
                .append(
                    AuditEvent::new(AuditKind::TokenRevoked)
                        .with_user(user_id)
                        .with_detail(format!("logout revoked {dropped} tokens")),
                )
                .await;
        }
        Ok(dropped)
    }

    /// The bearer-token gate for protected endpoints: the token must be in
    /// the store, unexpired, and carry a valid signature.
    pub async fn authenticate_bearer(&self, token_value: &str) -> Result<IssuedToken, AuthError> {
        let record = self
            .tokens
            .find_by_access_token(token_value)
            .await?
            .ok_or_else(|| AuthError::invalid_token("unknown or expired access token"))?;
        self.keys.decode::<AccessClaims>(token_value)?;
        Ok(record)
    }

    /// Looks up the user behind a token record, for UserInfo.
    pub async fn user_for_token(&self, record: &IssuedToken) -> Result<User, AuthError> {
        match &record.user_id {
            Some(user_id) => self.resolve_user(user_id).await,
            None => Err(AuthError::invalid_token(
                "token does not represent a user",
            )),
        }
    }

    async fn resolve_user(&self, user_id: &str) -> Result<User, AuthError> {
        if user_id == ANONYMOUS_USER {
            return Ok(User::anonymous());
        }
        self.auth
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("user no longer exists"))
    }

    fn check_scope<'a>(
        &self,
        client: &Client,
        scope: Option<&'a str>,
    ) -> Result<Option<&'a str>, AuthError> {
        if let Some(scope) = scope {
            validate_scope(scope)?;
            for token in scope.split(' ') {
                if !client.allows_scope(token) {
                    return Err(AuthError::invalid_scope(format!(
                        "scope not allowed: {token}"
                    )));
                }
            }
        }
        Ok(scope)
    }

    /// Signs an access token, stores the issued pair, and builds the
    /// response body.
    async fn issue(
        &self,
        client: &Client,
        user: Option<&User>,
        scope: Option<&str>,
        nonce: Option<&str>,
        with_refresh: bool,
    ) -> Result<TokenResponse, AuthError> {
        let now = OffsetDateTime::now_utc();
        let lifetime = self.access_token_lifetime(client);
        let expires_at = now + lifetime;

        let sub = user.map_or_else(|| client.client_id.clone(), |u| u.id.clone());
        let claims = AccessClaims {
            iss: self.config.issuer.clone(),
            sub: sub.clone(),
            aud: client.client_id.clone(),
            exp: expires_at.unix_timestamp(),
            iat: now.unix_timestamp(),
            jti: Uuid::new_v4().to_string(),
            scope: scope.map(str::to_string),
            client_id: client.client_id.clone(),
        };
        let access_token = self.keys.encode(&claims)?;

        let refresh_token = with_refresh.then(generate_code);
        let refresh_expires_at = refresh_token
            .as_ref()
            .map(|_| now + self.refresh_token_lifetime(client));

        self.tokens
            .insert(IssuedToken {
                access_token: access_token.clone(),
                refresh_token: refresh_token.clone(),
                user_id: user.map(|u| u.id.clone()),
                client_id: client.client_id.clone(),
                scope: scope.map(str::to_string),
                issued_at: now,
                expires_at,
                refresh_expires_at,
            })
            .await?;

        self.audit
            .append({
                let mut event = AuditEvent::new(AuditKind::TokenIssued).with_client(&client.client_id);
                if let Some(user) = user {
                    event = event.with_user(&user.id);
                }
                event
            })
            .await;
        info!(client_id = %client.client_id, "issued access token");

        let mut response = TokenResponse::bearer(access_token, lifetime.as_secs());
        if let Some(refresh_token) = refresh_token {
            response = response.with_refresh_token(refresh_token);
        }
        if let Some(scope) = scope {
            response = response.with_scope(scope);
        }
        if let (Some(user), Some(scope)) = (user, scope) {
            if scope.split(' ').any(|s| s == "openid") {
                let id_token = self
                    .oidc
                    .issue_id_token(user, &client.client_id, nonce)
                    .map_err(|e| AuthError::internal(e.to_string()))?;
                response = response.with_id_token(id_token);
            }
        }
        Ok(response)
    }

    fn access_token_lifetime(&self, client: &Client) -> Duration {
        client
            .access_token_lifetime
            .unwrap_or(self.config.tokens.access_token_lifetime)
    }

    fn refresh_token_lifetime(&self, client: &Client) -> Duration {
        client
            .refresh_token_lifetime
            .unwrap_or(self.config.tokens.refresh_token_lifetime)
    }
}
