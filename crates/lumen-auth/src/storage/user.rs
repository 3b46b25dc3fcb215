//! User account storage.

use async_trait::async_trait;

use crate::error::AuthError;
use crate::types::User;

/// Storage for end-user accounts.
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Looks up a user by stable identifier.
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AuthError>;

    /// Looks up a user by login name.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError>;

    /// Creates a new account. Fails if the id or username is taken.
    async fn create(&self, user: User) -> Result<(), AuthError>;

    /// Replaces an existing account record.
    async fn update(&self, user: User) -> Result<(), AuthError>;

    /// Verifies a username/password pair, returning the user on success.
    ///
    /// Unknown users and wrong passwords both return `None` so callers
    /// cannot distinguish the two.
    async fn verify_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, AuthError>;
}
