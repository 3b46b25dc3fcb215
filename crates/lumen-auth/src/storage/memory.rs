//! In-memory storage backend.
//!
//! Suitable for development and tests. Code and token stores sweep expired
//! entries lazily on every access, so nothing accumulates without a
//! background task.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;

use crate::authn::verify_password_hash;
use crate::error::AuthError;
use crate::oauth::AuthorizationCode;
use crate::storage::{ClientStorage, CodeStorage, TokenStorage, UserStorage};
use crate::types::{Client, IssuedToken, User};

/// In-memory client registry.
#[derive(Default)]
pub struct InMemoryClientStorage {
    clients: RwLock<HashMap<String, Client>>,
}

impl InMemoryClientStorage {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStorage for InMemoryClientStorage {
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Client>, AuthError> {
        Ok(self.clients.read().await.get(client_id).cloned())
    }

    async fn create(&self, client: Client) -> Result<(), AuthError> {
        let mut clients = self.clients.write().await;
        if clients.contains_key(&client.client_id) {
            return Err(AuthError::storage(format!(
                "client already exists: {}",
                client.client_id
            )));
        }
        clients.insert(client.client_id.clone(), client);
        Ok(())
    }

    async fn update(&self, client: Client) -> Result<(), AuthError> {
        let mut clients = self.clients.write().await;
        if !clients.contains_key(&client.client_id) {
            return Err(AuthError::storage(format!(
                "client not found: {}",
                client.client_id
            )));
        }
        clients.insert(client.client_id.clone(), client);
        Ok(())
    }

    async fn delete(&self, client_id: &str) -> Result<(), AuthError> {
        self.clients.write().await.remove(client_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Client>, AuthError> {
        Ok(self.clients.read().await.values().cloned().collect())
    }

    async fn verify_secret(&self, client_id: &str, secret: &str) -> Result<bool, AuthError> {
        let clients = self.clients.read().await;
        let Some(client) = clients.get(client_id) else {
            return Ok(false);
        };
        let Some(hash) = &client.client_secret_hash else {
            return Ok(false);
        };
        Ok(verify_password_hash(secret, hash))
    }
}

/// In-memory authorization code store with lazy expiry.
#[derive(Default)]
pub struct InMemoryCodeStorage {
    codes: RwLock<HashMap<String, AuthorizationCode>>,
}

impl InMemoryCodeStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) codes. Test helper.
    pub async fn len(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        self.codes
            .read()
            .await
            .values()
            .filter(|c| !c.is_expired(now))
            .count()
    }
}

#[async_trait]
impl CodeStorage for InMemoryCodeStorage {
    async fn put(&self, code: AuthorizationCode) -> Result<(), AuthError> {
        let mut codes = self.codes.write().await;
        let now = OffsetDateTime::now_utc();
        codes.retain(|_, c| !c.is_expired(now));
        codes.insert(code.code.clone(), code);
        Ok(())
    }

    async fn consume(&self, code: &str) -> Result<Option<AuthorizationCode>, AuthError> {
        let mut codes = self.codes.write().await;
        let now = OffsetDateTime::now_utc();
        codes.retain(|_, c| !c.is_expired(now));
        // remove() under the write lock makes redemption single-winner.
        let record = codes.remove(code);
        if record.is_some() {
            debug!("authorization code consumed");
        }
        Ok(record)
    }
}

/// In-memory token store with lazy expiry.
///
/// Access tokens index the primary map; a secondary index maps refresh
/// tokens back to their access token.
#[derive(Default)]
pub struct InMemoryTokenStorage {
    inner: RwLock<TokenMaps>,
}

#[derive(Default)]
struct TokenMaps {
    by_access: HashMap<String, IssuedToken>,
    refresh_index: HashMap<String, String>,
}

impl TokenMaps {
    fn sweep(&mut self, now: OffsetDateTime) {
        // A record stays while either half of it is still live.
        self.by_access
            .retain(|_, t| !t.is_expired(now) || !t.is_refresh_expired(now));
        let by_access = &self.by_access;
        self.refresh_index.retain(|_, access| {
            by_access
                .get(access)
                .map(|t| !t.is_refresh_expired(now))
                .unwrap_or(false)
        });
    }

    fn remove_by_access(&mut self, access_token: &str) {
        if let Some(token) = self.by_access.remove(access_token)
            && let Some(refresh) = token.refresh_token
        {
            self.refresh_index.remove(&refresh);
        }
    }
}

impl InMemoryTokenStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored token records. Test helper.
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_access.len()
    }
}

#[async_trait]
impl TokenStorage for InMemoryTokenStorage {
    async fn insert(&self, token: IssuedToken) -> Result<(), AuthError> {
        let mut inner = self.inner.write().await;
        inner.sweep(OffsetDateTime::now_utc());
        if let Some(refresh) = &token.refresh_token {
            inner
                .refresh_index
                .insert(refresh.clone(), token.access_token.clone());
        }
        inner.by_access.insert(token.access_token.clone(), token);
        Ok(())
    }

    async fn find_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<IssuedToken>, AuthError> {
        let mut inner = self.inner.write().await;
        let now = OffsetDateTime::now_utc();
        inner.sweep(now);
        Ok(inner
            .by_access
            .get(access_token)
            .filter(|t| !t.is_expired(now))
            .cloned())
    }

    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<IssuedToken>, AuthError> {
        let mut inner = self.inner.write().await;
        let now = OffsetDateTime::now_utc();
        inner.sweep(now);
        let Some(access) = inner.refresh_index.get(refresh_token).cloned() else {
            return Ok(None);
        };
        Ok(inner
            .by_access
            .get(&access)
            .filter(|t| !t.is_refresh_expired(now))
            .cloned())
    }

    async fn take_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<IssuedToken>, AuthError> {
        let mut inner = self.inner.write().await;
        let now = OffsetDateTime::now_utc();
        inner.sweep(now);
        let Some(access) = inner.refresh_index.remove(refresh_token) else {
            return Ok(None);
        };
        // remove() under the write lock makes redemption single-winner.
        Ok(inner
            .by_access
            .remove(&access)
            .filter(|t| !t.is_refresh_expired(now)))
    }

    async fn revoke_access_token(&self, access_token: &str) -> Result<(), AuthError> {
        let mut inner = self.inner.write().await;
        inner.remove_by_access(access_token);
        Ok(())
    }

    async fn revoke_refresh_token(&self, refresh_token: &str) -> Result<(), AuthError> {
        let mut inner = self.inner.write().await;
        if let Some(access) = inner.refresh_index.remove(refresh_token) {
            inner.by_access.remove(&access);
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64, AuthError> {
        let mut inner = self.inner.write().await;
        let doomed: Vec<String> = inner
            .by_access
            .values()
            .filter(|t| t.user_id.as_deref() == Some(user_id))
            .map(|t| t.access_token.clone())
            .collect();
        for access in &doomed {
            inner.remove_by_access(access);
        }
        Ok(doomed.len() as u64)
    }
}

/// In-memory user store.
#[derive(Default)]
pub struct InMemoryUserStorage {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStorage for InMemoryUserStorage {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create(&self, user: User) -> Result<(), AuthError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) || users.values().any(|u| u.username == user.username) {
            return Err(AuthError::storage(format!(
                "user already exists: {}",
                user.username
            )));
        }
        users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn update(&self, user: User) -> Result<(), AuthError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(AuthError::storage(format!("user not found: {}", user.id)));
        }
        users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn verify_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, AuthError> {
        let users = self.users.read().await;
        let Some(user) = users.values().find(|u| u.username == username) else {
            return Ok(None);
        };
        let Some(hash) = &user.password_hash else {
            return Ok(None);
        };
        if verify_password_hash(password, hash) {
            Ok(Some(user.clone()))
        } else {
            Ok(None)
        }
    }
}
