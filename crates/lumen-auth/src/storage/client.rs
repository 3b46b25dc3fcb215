//! Client registration storage.

use async_trait::async_trait;

use crate::error::AuthError;
use crate::types::Client;

/// Storage for registered OAuth clients.
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Looks up a client by its client id.
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Client>, AuthError>;

    /// Registers a new client. Fails if the client id is taken.
    async fn create(&self, client: Client) -> Result<(), AuthError>;

    /// Replaces an existing registration.
    async fn update(&self, client: Client) -> Result<(), AuthError>;

    /// Removes a registration. Succeeds even if the client does not exist.
    async fn delete(&self, client_id: &str) -> Result<(), AuthError>;

    /// Lists all registered clients.
    async fn list(&self) -> Result<Vec<Client>, AuthError>;

    /// Verifies a client secret against the stored hash.
    ///
    /// Returns `false` for unknown clients and for public clients, which
    /// have no secret to verify.
    async fn verify_secret(&self, client_id: &str, secret: &str) -> Result<bool, AuthError>;
}
