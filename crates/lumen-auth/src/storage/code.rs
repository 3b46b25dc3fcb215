//! Authorization code storage.

use async_trait::async_trait;

use crate::error::AuthError;
use crate::oauth::AuthorizationCode;

/// Storage for pending authorization codes.
///
/// Implementations must make [`CodeStorage::consume`] atomic: two concurrent
/// redemptions of the same code must hand the record to at most one caller.
#[async_trait]
pub trait CodeStorage: Send + Sync {
    /// Stores a freshly issued code.
    async fn put(&self, code: AuthorizationCode) -> Result<(), AuthError>;

    /// Removes and returns the record for a code, or `None` if the code is
    /// unknown, already redeemed, or expired.
    async fn consume(&self, code: &str) -> Result<Option<AuthorizationCode>, AuthError>;
}
