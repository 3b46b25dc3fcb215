//! Stored token records.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A token issued by the server, as held in the token store.
///
/// The store is the authority on token state: a token that has been removed
/// from the store is revoked regardless of what its signature says.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    /// The access token value (a signed JWT).
    pub access_token: String,

    /// The refresh token paired with this access token, if one was issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// The resource owner the token was issued for. `None` for
    /// client-credentials tokens, which represent the client itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// The client the token was issued to.
    pub client_id: String,

    /// Space-separated scope granted to the token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// When the token was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// When the access token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// When the refresh token expires, if one was issued.
    #[serde(default, with = "time::serde::rfc3339::option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_expires_at: Option<OffsetDateTime>,
}

impl IssuedToken {
    /// Returns `true` if the access token has passed its expiry.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Returns `true` if the refresh token has passed its expiry.
    ///
    /// Tokens without a refresh token report `true`; there is nothing
    /// left to refresh with.
    #[must_use]
    pub fn is_refresh_expired(&self, now: OffsetDateTime) -> bool {
        match self.refresh_expires_at {
            Some(expires) => now >= expires,
            None => true,
        }
    }

    /// Remaining access-token lifetime in whole seconds, zero if expired.
    #[must_use]
    pub fn expires_in(&self, now: OffsetDateTime) -> u64 {
        let remaining = self.expires_at - now;
        remaining.whole_seconds().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn token(issued: OffsetDateTime) -> IssuedToken {
        IssuedToken {
            access_token: "at".to_string(),
            refresh_token: None,
            user_id: Some("u-1".to_string()),
            client_id: "app".to_string(),
            scope: Some("read".to_string()),
            issued_at: issued,
            expires_at: issued + Duration::hours(1),
            refresh_expires_at: None,
        }
    }

    #[test]
    fn test_expiry() {
        let now = OffsetDateTime::now_utc();
        let t = token(now);
        assert!(!t.is_expired(now));
        assert!(t.is_expired(now + Duration::hours(2)));
        // The boundary instant counts as expired.
        assert!(t.is_expired(now + Duration::hours(1)));
    }

    #[test]
    fn test_expires_in_clamps_to_zero() {
        let now = OffsetDateTime::now_utc();
        let t = token(now);
        assert_eq!(t.expires_in(now), 3600);
        assert_eq!(t.expires_in(now + Duration::hours(2)), 0);
    }

    #[test]
    fn test_refresh_expiry_without_refresh_token() {
        let now = OffsetDateTime::now_utc();
        let t = token(now);
        assert!(t.is_refresh_expired(now));
    }
}
