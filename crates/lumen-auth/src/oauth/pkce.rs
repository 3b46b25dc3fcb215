//! PKCE (Proof Key for Code Exchange) support per RFC 7636.
//!
//! Public clients bind an authorization code to a `code_verifier` they keep
//! locally, sending only a derived `code_challenge` through the front
//! channel. At exchange time the server recomputes the challenge from the
//! presented verifier and compares in constant time.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::error::AuthError;

/// Minimum code verifier length per RFC 7636 §4.1.
pub const MIN_VERIFIER_LENGTH: usize = 43;

/// Maximum code verifier length per RFC 7636 §4.1.
pub const MAX_VERIFIER_LENGTH: usize = 128;

/// Transformation applied to the verifier to produce the challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CodeChallengeMethod {
    /// `challenge = BASE64URL(SHA256(verifier))`. The only method clients
    /// should use.
    S256,
    /// `challenge = verifier`. Kept for RFC 7636 compatibility only.
    Plain,
}

impl CodeChallengeMethod {
    /// Parses the wire value of a `code_challenge_method` parameter.
    pub fn parse(value: &str) -> Result<Self, AuthError> {
        match value {
            "S256" => Ok(Self::S256),
            "plain" => Ok(Self::Plain),
            other => Err(AuthError::invalid_request(format!(
                "unsupported code_challenge_method: {other}"
            ))),
        }
    }

    /// Returns the wire value of this method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }
}

impl std::fmt::Display for CodeChallengeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generates a random code verifier: 32 random bytes, base64url encoded
/// without padding (43 characters).
#[must_use]
pub fn generate_verifier() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Validates a code verifier's format per RFC 7636 §4.1.
///
/// Verifiers are 43-128 characters drawn from the unreserved URI set:
/// `[A-Za-z0-9]`, `-`, `.`, `_`, `~`.
pub fn validate_verifier(verifier: &str) -> Result<(), AuthError> {
    if verifier.len() < MIN_VERIFIER_LENGTH || verifier.len() > MAX_VERIFIER_LENGTH {
        return Err(AuthError::invalid_grant(format!(
            "code_verifier must be {MIN_VERIFIER_LENGTH}-{MAX_VERIFIER_LENGTH} characters"
        )));
    }
    if !verifier
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
    {
        return Err(AuthError::invalid_grant(
            "code_verifier contains invalid characters",
        ));
    }
    Ok(())
}

/// Computes the S256 challenge for a verifier:
/// `BASE64URL-ENCODE(SHA256(ASCII(verifier)))`, unpadded.
#[must_use]
pub fn compute_s256_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Verifies a presented code verifier against the stored challenge.
///
/// The verifier format is validated first, then the recomputed challenge is
/// compared to the stored one in constant time.
pub fn verify_challenge(
    verifier: &str,
    challenge: &str,
    method: CodeChallengeMethod,
) -> Result<(), AuthError> {
    validate_verifier(verifier)?;
    let computed = match method {
        CodeChallengeMethod::S256 => compute_s256_challenge(verifier),
        CodeChallengeMethod::Plain => verifier.to_string(),
    };
    if !constant_time_eq(computed.as_bytes(), challenge.as_bytes()) {
        return Err(AuthError::PkceVerificationFailed);
    }
    Ok(())
}

/// Compares two byte slices without short-circuiting on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
