//! Authorization code records.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::oauth::pkce::CodeChallengeMethod;

/// A single-use authorization code, issued by the authorize endpoint and
/// redeemed exactly once at the token endpoint.
///
/// Single use is enforced by the store: redemption removes the record
/// atomically, so a second presentation finds nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// The opaque code value.
    pub code: String,

    /// The client the code was issued to.
    pub client_id: String,

    /// The authenticated resource owner.
    pub user_id: String,

    /// The redirect URI the code was issued against. The token request
    /// must present the same value.
    pub redirect_uri: String,

    /// Scope approved in the authorization request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// OIDC nonce to echo into the ID token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// PKCE challenge, if the client sent one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE challenge method paired with [`Self::code_challenge`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<CodeChallengeMethod>,

    /// When the code was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the code stops being redeemable.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl AuthorizationCode {
    /// Returns `true` if the code has passed its expiry.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Returns `true` if the code was issued with a PKCE challenge.
    #[must_use]
    pub fn has_pkce(&self) -> bool {
        self.code_challenge.is_some()
    }
}

/// Generates a fresh opaque token value: 16 random bytes, hex encoded
/// (32 characters).
#[must_use]
pub fn generate_code() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
