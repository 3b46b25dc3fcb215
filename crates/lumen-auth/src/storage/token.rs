//! Issued token storage.

use async_trait::async_trait;

use crate::error::AuthError;
use crate::types::IssuedToken;

/// Storage for issued tokens.
///
/// The store is authoritative for revocation and expiry: introspection
/// consults the store, not the token's own claims.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Records a newly issued token.
    async fn insert(&self, token: IssuedToken) -> Result<(), AuthError>;

    /// Looks up a token by its access token value. Expired tokens are
    /// treated as absent.
    async fn find_by_access_token(&self, access_token: &str)
    -> Result<Option<IssuedToken>, AuthError>;

    /// Looks up a token by its refresh token value. Tokens whose refresh
    /// token has expired are treated as absent.
    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<IssuedToken>, AuthError>;

    /// Atomically removes and returns the record holding a refresh token,
    /// so redemption has a single winner. Expired refresh tokens are
    /// treated as absent.
    async fn take_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<IssuedToken>, AuthError>;

    /// Removes the token record for an access token. Idempotent.
    async fn revoke_access_token(&self, access_token: &str) -> Result<(), AuthError>;

    /// Removes the token record holding a refresh token. Idempotent.
    async fn revoke_refresh_token(&self, refresh_token: &str) -> Result<(), AuthError>;

    /// Removes every token issued to a user, returning how many were
    /// dropped. Used by logout.
    async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64, AuthError>;
}
