//! Token revocation wire types (RFC 7009).

use serde::{Deserialize, Serialize};

/// Form parameters of a revocation request.
///
/// Revocation is idempotent: revoking an unknown or already-revoked token
/// succeeds with an empty 200, per RFC 7009 §2.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationRequest {
    /// The token to revoke.
    pub token: String,

    /// Hint about the token type, `access_token` or `refresh_token`.
    /// Accepted and ignored; both stores are tried.
    #[serde(default)]
    pub token_type_hint: Option<String>,

    /// Client id, when authenticating in the body.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Client secret, when authenticating in the body.
    #[serde(default)]
    pub client_secret: Option<String>,
}
