//! Registered OAuth client representation.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;

use crate::error::AuthError;

/// OAuth 2.0 grant types supported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization code grant (RFC 6749 §4.1).
    AuthorizationCode,
    /// Client credentials grant (RFC 6749 §4.4).
    ClientCredentials,
    /// Resource owner password credentials grant (RFC 6749 §4.3).
    Password,
    /// Refresh token grant (RFC 6749 §6).
    RefreshToken,
}

impl GrantType {
    /// Parses the wire value of a `grant_type` parameter.
    pub fn parse(value: &str) -> Result<Self, AuthError> {
        match value {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "client_credentials" => Ok(Self::ClientCredentials),
            "password" => Ok(Self::Password),
            "refresh_token" => Ok(Self::RefreshToken),
            other => Err(AuthError::unsupported_grant_type(other)),
        }
    }

    /// Returns the wire value of this grant type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
            Self::Password => "password",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a client can keep a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    /// Server-side client that authenticates with a secret.
    Confidential,
    /// Browser or native client; PKCE required for code flows.
    Public,
}

/// A registered OAuth 2.0 client application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier.
    pub client_id: String,

    /// Argon2 hash of the client secret. `None` for public clients.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret_hash: Option<String>,

    /// Human-readable client name.
    pub name: String,

    /// Confidential or public.
    pub client_type: ClientType,

    /// Redirect URIs registered for the authorization code flow.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Grant types this client is allowed to use.
    #[serde(default)]
    pub allowed_grant_types: Vec<GrantType>,

    /// Scopes this client may request. Empty means any scope is allowed.
    #[serde(default)]
    pub allowed_scopes: Vec<String>,

    /// Overrides the server-wide access token lifetime for this client.
    #[serde(default, with = "humantime_serde")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_lifetime: Option<std::time::Duration>,

    /// Overrides the server-wide refresh token lifetime for this client.
    #[serde(default, with = "humantime_serde")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_lifetime: Option<std::time::Duration>,

    /// When the client was registered.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Client {
    /// Creates a confidential client with the given id and secret hash.
    #[must_use]
    pub fn confidential(
        client_id: impl Into<String>,
        name: impl Into<String>,
        client_secret_hash: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret_hash: Some(client_secret_hash.into()),
            name: name.into(),
            client_type: ClientType::Confidential,
            redirect_uris: Vec::new(),
            allowed_grant_types: Vec::new(),
            allowed_scopes: Vec::new(),
            access_token_lifetime: None,
            refresh_token_lifetime: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Creates a public client with the given id.
    #[must_use]
    pub fn public(client_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret_hash: None,
            name: name.into(),
            client_type: ClientType::Public,
            redirect_uris: Vec::new(),
            allowed_grant_types: Vec::new(),
            allowed_scopes: Vec::new(),
            access_token_lifetime: None,
            refresh_token_lifetime: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Adds a registered redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.push(uri.into());
        self
    }

    /// Adds an allowed grant type.
    #[must_use]
    pub fn with_grant_type(mut self, grant_type: GrantType) -> Self {
        self.allowed_grant_types.push(grant_type);
        self
    }

    /// Returns `true` if this client has no secret.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.client_type == ClientType::Public
    }

    /// Returns `true` if this client may use the given grant type.
    ///
    /// An empty allow-list permits every grant type.
    #[must_use]
    pub fn supports_grant(&self, grant_type: GrantType) -> bool {
        self.allowed_grant_types.is_empty() || self.allowed_grant_types.contains(&grant_type)
    }

    /// Returns `true` if the client may request the given scope token.
    #[must_use]
    pub fn allows_scope(&self, scope: &str) -> bool {
        self.allowed_scopes.is_empty() || self.allowed_scopes.iter().any(|s| s == scope)
    }

    /// Checks a requested redirect URI against the registered ones.
    ///
    /// A requested URI matches a registered URI when the scheme and host are
    /// identical and the requested path starts with the registered path. For
    /// loopback hosts (`localhost`, `127.0.0.1`) the port is ignored, per
    /// RFC 8252 §7.3; for every other host the port must match exactly.
    #[must_use]
    pub fn redirect_uri_matches(&self, requested: &str) -> bool {
        let Ok(requested) = Url::parse(requested) else {
            return false;
        };
        self.redirect_uris.iter().any(|registered| {
            Url::parse(registered)
                .map(|registered| uri_matches(&registered, &requested))
                .unwrap_or(false)
        })
    }

    /// Validates the registration for internal consistency.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.client_id.is_empty() {
            return Err(AuthError::invalid_request("client_id must not be empty"));
        }
        if self.client_type == ClientType::Confidential && self.client_secret_hash.is_none() {
            return Err(AuthError::invalid_request(
                "confidential clients require a client secret",
            ));
        }
        if self.client_type == ClientType::Public && self.client_secret_hash.is_some() {
            return Err(AuthError::invalid_request(
                "public clients must not carry a client secret",
            ));
        }
        for uri in &self.redirect_uris {
            let parsed = Url::parse(uri)
                .map_err(|_| AuthError::invalid_request(format!("invalid redirect URI: {uri}")))?;
            if parsed.fragment().is_some() {
                return Err(AuthError::invalid_request(
                    "redirect URIs must not contain a fragment",
                ));
            }
        }
        Ok(())
    }
}

fn is_loopback_host(url: &Url) -> bool {
    matches!(url.host_str(), Some("localhost" | "127.0.0.1"))
}

fn uri_matches(registered: &Url, requested: &Url) -> bool {
    if registered.scheme() != requested.scheme() {
        return false;
    }
    if registered.host_str() != requested.host_str() {
        return false;
    }
    // Loopback redirects get a fresh ephemeral port each run.
    if !is_loopback_host(registered) && registered.port_or_known_default() != requested.port_or_known_default()
    {
        return false;
    }
    requested.path().starts_with(registered.path())
}
