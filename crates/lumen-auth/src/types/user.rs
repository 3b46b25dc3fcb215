//! End-user account representation.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Identifier accepted for unauthenticated sessions.
pub const ANONYMOUS_USER: &str = "anonymous";

/// An end user known to the authorization server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Stable unique identifier, used as the `sub` claim.
    pub id: String,

    /// Login name.
    pub username: String,

    /// Argon2 hash of the user's password. `None` for accounts that
    /// authenticate through an external mechanism.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,

    /// Email address, surfaced through the UserInfo endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Display name, surfaced through the UserInfo endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// When the account was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    /// Creates a user with the given id and username.
    #[must_use]
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            password_hash: None,
            email: None,
            display_name: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Sets the password hash.
    #[must_use]
    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// The synthetic user representing an unauthenticated session.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS_USER, ANONYMOUS_USER)
    }

    /// Returns `true` if this is the anonymous sentinel user.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.id == ANONYMOUS_USER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_user() {
        let user = User::anonymous();
        assert!(user.is_anonymous());
        assert_eq!(user.id, "anonymous");
        assert!(user.password_hash.is_none());
    }

    #[test]
    fn test_builder() {
        let user = User::new("u-1", "alice")
            .with_email("alice@example.com")
            .with_display_name("Alice");
        assert!(!user.is_anonymous());
        assert_eq!(user.email.as_deref(), Some("alice@example.com"));
        assert_eq!(user.display_name.as_deref(), Some("Alice"));
    }
}
