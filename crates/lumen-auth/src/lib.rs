//! OAuth 2.0 / OpenID Connect identity-provider core.
//!
//! This crate implements the protocol engine of an authorization server:
//! the authorization code flow with PKCE (RFC 7636), the client
//! credentials, password, and refresh token grants (RFC 6749), token
//! introspection (RFC 7662) and revocation (RFC 7009), RS256-signed JWT
//! access tokens with rotating keys published as JWKS (RFC 7517), and
//! OIDC ID tokens with UserInfo and logout endpoints.
//!
//! # Architecture
//!
//! - [`oauth::AuthorizationService`] owns the front-channel flow: request
//!   validation, user authentication, and authorization code issuance.
//! - [`token::TokenService`] owns the back channel: grant dispatch, token
//!   minting, introspection, and revocation.
//! - [`token::jwt::KeyManager`] holds the signing keys; after a rotation
//!   the previous key keeps verifying until the next rotation.
//! - Storage is behind `async_trait` interfaces in [`storage`], with
//!   in-memory implementations for development and tests.
//! - [`http`] exposes the whole surface as an axum router.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use lumen_auth::authn::AuthHandler;
//! use lumen_auth::audit::TracingAuditSink;
//! use lumen_auth::config::AuthConfig;
//! use lumen_auth::http::{self, HttpServices};
//! use lumen_auth::oauth::AuthorizationService;
//! use lumen_auth::storage::{
//!     ClientStorage, CodeStorage, InMemoryClientStorage, InMemoryCodeStorage,
//!     InMemoryTokenStorage, InMemoryUserStorage, TokenStorage, UserStorage,
//! };
//! use lumen_auth::token::jwt::KeyManager;
//! use lumen_auth::token::{OidcTokenService, TokenService};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::new("https://auth.example.com");
//! config.validate()?;
//!
//! let clients: Arc<dyn ClientStorage> = Arc::new(InMemoryClientStorage::new());
//! let codes: Arc<dyn CodeStorage> = Arc::new(InMemoryCodeStorage::new());
//! let tokens: Arc<dyn TokenStorage> = Arc::new(InMemoryTokenStorage::new());
//! let users: Arc<dyn UserStorage> = Arc::new(InMemoryUserStorage::new());
//!
//! let keys = Arc::new(KeyManager::generate(config.keys.clone())?);
//! let oidc = Arc::new(OidcTokenService::new(
//!     Arc::clone(&keys),
//!     &config.issuer,
//!     Duration::from_secs(3600),
//! ));
//! let auth = AuthHandler::new(Arc::clone(&users));
//! let audit = Arc::new(TracingAuditSink);
//!
//! let authorization = Arc::new(AuthorizationService::new(
//!     Arc::clone(&clients),
//!     Arc::clone(&codes),
//!     auth.clone(),
//!     audit.clone(),
//!     config.clone(),
//! ));
//! let token_service = Arc::new(TokenService::new(
//!     codes,
//!     tokens,
//!     auth,
//!     Arc::clone(&keys),
//!     Arc::clone(&oidc),
//!     audit,
//!     config.clone(),
//! ));
//!
//! let router = http::router(HttpServices {
//!     authorization,
//!     tokens: token_service,
//!     clients,
//!     keys: Arc::clone(&keys),
//!     oidc,
//! });
//! # let _ = router;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod authn;
pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod storage;
pub mod token;
pub mod types;

pub use config::AuthConfig;
pub use error::{AuthError, ErrorCategory};

/// Convenience alias used throughout the crate.
pub type AuthResult<T> = Result<T, AuthError>;
