//! User authentication glue.
//!
//! [`AuthHandler`] sits between the HTTP layer and user storage: it turns
//! the identifier submitted with a consent form into a [`User`], creating
//! the account on first sight, and checks resource-owner credentials for
//! the password grant. Password hashing uses Argon2id throughout.

use std::sync::Arc;

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AuthError;
use crate::storage::UserStorage;
use crate::types::User;
use crate::types::user::ANONYMOUS_USER;

/// Hashes a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::internal(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Verifies a password against a stored Argon2 hash.
///
/// Malformed hashes verify as `false` rather than erroring; a corrupt
/// record must never admit a login.
#[must_use]
pub fn verify_password_hash(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// External collaborator that decorates newly created users, e.g. with a
/// generated display tag.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns a display name for the user, or `None` to leave it unset.
    async fn display_name_for(&self, username: &str) -> Option<String>;
}

/// Resolves submitted identities against user storage.
#[derive(Clone)]
pub struct AuthHandler {
    users: Arc<dyn UserStorage>,
    identity: Option<Arc<dyn IdentityProvider>>,
}

impl AuthHandler {
    /// Creates a handler backed by the given user storage.
    #[must_use]
    pub fn new(users: Arc<dyn UserStorage>) -> Self {
        Self {
            users,
            identity: None,
        }
    }

    /// Attaches an identity provider consulted when creating users.
    #[must_use]
    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(provider);
        self
    }

    /// Checks that an identifier is usable: non-empty after trimming.
    /// The literal `anonymous` is always acceptable.
    pub fn validate_identifier(identifier: &str) -> Result<(), AuthError> {
        if identifier.trim().is_empty() {
            return Err(AuthError::invalid_request("identifier must not be empty"));
        }
        Ok(())
    }

    /// Resolves an identifier into a user, creating the account on first
    /// sight.
    ///
    /// The literal `anonymous` short-circuits to the synthetic anonymous
    /// user without touching storage. Any user with no display name gets
    /// one from the identity provider, when attached, and the decorated
    /// record is persisted.
    pub async fn authenticate(&self, identifier: &str) -> Result<User, AuthError> {
        Self::validate_identifier(identifier)?;
        let identifier = identifier.trim();

        if identifier == ANONYMOUS_USER {
            debug!("authenticated anonymous identifier");
            return Ok(User::anonymous());
        }

        if let Some(mut existing) = self.users.find_by_username(identifier).await? {
            if self.decorate(&mut existing).await {
                self.users.update(existing.clone()).await?;
                debug!(user_id = %existing.id, "stored display name for existing user");
            }
            return Ok(existing);
        }

        let mut user = User::new(Uuid::new_v4().to_string(), identifier);
        self.decorate(&mut user).await;
        self.users.create(user.clone()).await?;
        info!(user_id = %user.id, "created user on first login");
        Ok(user)
    }

    /// Fills in a missing display name from the identity provider.
    /// Returns `true` if the user changed.
    async fn decorate(&self, user: &mut User) -> bool {
        if user.display_name.is_none()
            && let Some(provider) = &self.identity
            && let Some(name) = provider.display_name_for(&user.username).await
        {
            user.display_name = Some(name);
            return true;
        }
        false
    }

    /// Checks resource-owner credentials for the password grant.
    pub async fn authenticate_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, AuthError> {
        self.users.verify_password(username, password).await
    }

    /// Looks up a user by stable id.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, AuthError> {
        self.users.find_by_id(id).await
    }
}
