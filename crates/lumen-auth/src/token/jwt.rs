//! RS256 signing keys and the JWKS document.
//!
//! [`KeyManager`] owns the active signing key and, after a rotation, the
//! previous one. Tokens are signed with the current key; verification tries
//! the key named by the token's `kid` header, falling back to the previous
//! key so tokens issued just before a rotation keep verifying until the next
//! rotation evicts that key.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::config::KeyConfig;

/// Errors from key generation, signing, and verification.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// RSA key generation or serialization failed.
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Signing a token failed.
    #[error("Token encoding failed: {0}")]
    Encoding(String),

    /// The token's signature does not verify against any held key.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// The token's `exp` claim is in the past.
    #[error("Token expired")]
    Expired,

    /// The token is structurally invalid.
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// The key ring lock was poisoned by a panicking writer.
    #[error("Key ring unavailable")]
    KeyRing,
}

impl From<JwtError> for crate::error::AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => Self::TokenExpired,
            JwtError::InvalidSignature => Self::invalid_token("invalid signature"),
            JwtError::Malformed(msg) => Self::invalid_token(msg),
            JwtError::KeyGeneration(msg) | JwtError::Encoding(msg) => Self::internal(msg),
            JwtError::KeyRing => Self::internal("key ring unavailable"),
        }
    }
}

/// Registered claims of an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Issuer URL.
    pub iss: String,
    /// Subject: user id, or client id for client-credentials tokens.
    pub sub: String,
    /// Audience: the client the token was issued to.
    pub aud: String,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Unique token id.
    pub jti: String,
    /// Granted scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// The client the token was issued to.
    pub client_id: String,
}

/// A public key in JWK form (RFC 7517).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, always `RSA`.
    pub kty: String,
    /// Key use, always `sig`.
    #[serde(rename = "use")]
    pub use_: String,
    /// Key id matching the `kid` token header.
    pub kid: String,
    /// Signing algorithm, always `RS256`.
    pub alg: String,
    /// Modulus, base64url.
    pub n: String,
    /// Exponent, base64url.
    pub e: String,
}

/// The JWKS document served at `/.well-known/jwks.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwkSet {
    /// Published keys.
    pub keys: Vec<Jwk>,
}

/// An RSA key pair ready for RS256 signing and verification.
pub struct SigningKeyPair {
    /// Key id: first 16 hex characters of SHA-256 over the public key DER.
    pub kid: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    /// Modulus, base64url, for JWKS.
    n: String,
    /// Exponent, base64url, for JWKS.
    e: String,
    /// When the pair was generated.
    pub created_at: OffsetDateTime,
}

impl SigningKeyPair {
    /// Generates a fresh RSA key pair of the given modulus size.
    pub fn generate(bits: usize) -> Result<Self, JwtError> {
        let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, bits)
            .map_err(|e| JwtError::KeyGeneration(e.to_string()))?;
        let public = RsaPublicKey::from(&private);

        let private_pem = private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| JwtError::KeyGeneration(e.to_string()))?;
        let public_pem = public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| JwtError::KeyGeneration(e.to_string()))?;
        let public_der = public
            .to_public_key_der()
            .map_err(|e| JwtError::KeyGeneration(e.to_string()))?;

        let digest = Sha256::digest(public_der.as_bytes());
        let kid = hex::encode(digest)[..16].to_string();

        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| JwtError::KeyGeneration(e.to_string()))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| JwtError::KeyGeneration(e.to_string()))?;

        Ok(Self {
            kid,
            encoding_key,
            decoding_key,
            n: URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
            created_at: OffsetDateTime::now_utc(),
        })
    }

    /// Exports the public half as a JWK.
    #[must_use]
    pub fn to_jwk(&self) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            use_: "sig".to_string(),
            kid: self.kid.clone(),
            alg: "RS256".to_string(),
            n: self.n.clone(),
            e: self.e.clone(),
        }
    }
}

struct KeyRing {
    current: Arc<SigningKeyPair>,
    previous: Option<Arc<SigningKeyPair>>,
}

/// Holds the signing keys and performs all JWT encode/decode work.
pub struct KeyManager {
    ring: RwLock<KeyRing>,
    config: KeyConfig,
}

impl KeyManager {
    /// Generates an initial key pair and builds the manager around it.
    pub fn generate(config: KeyConfig) -> Result<Self, JwtError> {
        let current = Arc::new(SigningKeyPair::generate(config.rsa_bits)?);
        info!(kid = %current.kid, "generated initial signing key");
        Ok(Self {
            ring: RwLock::new(KeyRing {
                current,
                previous: None,
            }),
            config,
        })
    }

    /// The `kid` of the key new tokens are signed with.
    pub fn current_kid(&self) -> Result<String, JwtError> {
        let ring = self.ring.read().map_err(|_| JwtError::KeyRing)?;
        Ok(ring.current.kid.clone())
    }

    /// Rotates the signing key: the current key becomes the previous key
    /// (still valid for verification) and a fresh pair takes over signing.
    /// The key that was previous before the rotation stops verifying.
    pub fn rotate(&self) -> Result<(), JwtError> {
        let fresh = Arc::new(SigningKeyPair::generate(self.config.rsa_bits)?);
        let mut ring = self.ring.write().map_err(|_| JwtError::KeyRing)?;
        let retired = std::mem::replace(&mut ring.current, Arc::clone(&fresh));
        ring.previous = Some(retired);
        info!(kid = %fresh.kid, "rotated signing key");
        Ok(())
    }

    /// Signs claims with the current key. The header carries the key's `kid`.
    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        let current = {
            let ring = self.ring.read().map_err(|_| JwtError::KeyRing)?;
            Arc::clone(&ring.current)
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(current.kid.clone());
        jsonwebtoken::encode(&header, claims, &current.encoding_key)
            .map_err(|e| JwtError::Encoding(e.to_string()))
    }

    /// Verifies a token's signature and expiry, returning its claims.
    ///
    /// The key is chosen by the token's `kid` header; a token signed by the
    /// previous key still verifies. Claim-level checks beyond `exp` are the
    /// caller's responsibility.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, JwtError> {
        self.decode_inner(token, true)
    }

    /// Like [`KeyManager::decode`] but accepts expired tokens. Used by
    /// introspection, where the store decides liveness.
    pub fn decode_allow_expired<T: DeserializeOwned>(&self, token: &str) -> Result<T, JwtError> {
        self.decode_inner(token, false)
    }

    fn decode_inner<T: DeserializeOwned>(
        &self,
        token: &str,
        validate_exp: bool,
    ) -> Result<T, JwtError> {
        let header =
            jsonwebtoken::decode_header(token).map_err(|e| JwtError::Malformed(e.to_string()))?;

        let (current, previous) = {
            let ring = self.ring.read().map_err(|_| JwtError::KeyRing)?;
            (Arc::clone(&ring.current), ring.previous.clone())
        };

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = validate_exp;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        // Pick the key named by the kid header; an absent or unknown kid
        // falls back to trying every held key.
        let mut candidates: Vec<&SigningKeyPair> = Vec::new();
        match header.kid.as_deref() {
            Some(kid) if kid == current.kid => candidates.push(&current),
            Some(kid) if previous.as_ref().is_some_and(|p| p.kid == kid) => {
                if let Some(prev) = &previous {
                    candidates.push(prev);
                }
            }
            _ => {
                candidates.push(&current);
                if let Some(prev) = &previous {
                    candidates.push(prev);
                }
            }
        }

        let mut last_err = JwtError::InvalidSignature;
        for key in candidates {
            match jsonwebtoken::decode::<T>(token, &key.decoding_key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) => {
                    last_err = match e.kind() {
                        ErrorKind::ExpiredSignature => JwtError::Expired,
                        ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                        _ => JwtError::Malformed(e.to_string()),
                    };
                }
            }
        }
        Err(last_err)
    }

    /// The JWKS document. Only the current key is published; tokens signed
    /// by the previous key are for this server to verify, not for clients.
    pub fn jwks(&self) -> Result<JwkSet, JwtError> {
        let ring = self.ring.read().map_err(|_| JwtError::KeyRing)?;
        Ok(JwkSet {
            keys: vec![ring.current.to_jwk()],
        })
    }
}

/// Spawns a background task that rotates the signing key on a fixed
/// interval.
pub fn spawn_rotation(manager: Arc<KeyManager>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; the initial key is already live.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match manager.rotate() {
                Ok(()) => {}
                Err(e) => {
                    warn!(error = %e, "signing key rotation failed, retrying next interval");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> KeyConfig {
        KeyConfig {
            rsa_bits: 2048,
            rotation_interval: Duration::from_secs(24 * 3600),
        }
    }

    fn claims(exp_offset: i64) -> AccessClaims {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        AccessClaims {
            iss: "https://auth.example.com".to_string(),
            sub: "u-1".to_string(),
            aud: "app".to_string(),
            exp: now + exp_offset,
            iat: now,
            jti: "jti-1".to_string(),
            scope: Some("read".to_string()),
            client_id: "app".to_string(),
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let manager = KeyManager::generate(test_config()).unwrap();
        let token = manager.encode(&claims(3600)).unwrap();
        let decoded: AccessClaims = manager.decode(&token).unwrap();
        assert_eq!(decoded.sub, "u-1");
        assert_eq!(decoded.client_id, "app");
    }

    #[test]
    fn test_header_carries_kid() {
        let manager = KeyManager::generate(test_config()).unwrap();
        let token = manager.encode(&claims(3600)).unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.kid.unwrap(), manager.current_kid().unwrap());
    }

    #[test]
    fn test_kid_shape() {
        let manager = KeyManager::generate(test_config()).unwrap();
        let kid = manager.current_kid().unwrap();
        assert_eq!(kid.len(), 16);
        assert!(kid.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_expired_token_rejected() {
        let manager = KeyManager::generate(test_config()).unwrap();
        let token = manager.encode(&claims(-3600)).unwrap();
        let result = manager.decode::<AccessClaims>(&token);
        assert!(matches!(result, Err(JwtError::Expired)));
    }

    #[test]
    fn test_decode_allow_expired() {
        let manager = KeyManager::generate(test_config()).unwrap();
        let token = manager.encode(&claims(-3600)).unwrap();
        let decoded: AccessClaims = manager.decode_allow_expired(&token).unwrap();
        assert_eq!(decoded.sub, "u-1");
    }

    #[test]
    fn test_garbage_token_rejected() {
        let manager = KeyManager::generate(test_config()).unwrap();
        assert!(manager.decode::<AccessClaims>("not.a.jwt").is_err());
        assert!(manager.decode::<AccessClaims>("").is_err());
    }

    #[test]
    fn test_rotation_grace_window() {
        let manager = KeyManager::generate(test_config()).unwrap();
        let old_kid = manager.current_kid().unwrap();
        let token = manager.encode(&claims(3600)).unwrap();

        manager.rotate().unwrap();
        assert_ne!(manager.current_kid().unwrap(), old_kid);

        // Token signed before rotation still verifies.
        let decoded: AccessClaims = manager.decode(&token).unwrap();
        assert_eq!(decoded.sub, "u-1");
    }

    #[test]
    fn test_second_rotation_evicts_oldest_key() {
        let manager = KeyManager::generate(test_config()).unwrap();
        let token = manager.encode(&claims(3600)).unwrap();

        manager.rotate().unwrap();
        manager.rotate().unwrap();

        assert!(manager.decode::<AccessClaims>(&token).is_err());
    }

    #[test]
    fn test_foreign_key_rejected() {
        let manager = KeyManager::generate(test_config()).unwrap();
        let other = KeyManager::generate(test_config()).unwrap();
        let token = other.encode(&claims(3600)).unwrap();
        assert!(matches!(
            manager.decode::<AccessClaims>(&token),
            Err(JwtError::InvalidSignature)
        ));
    }

    #[test]
    fn test_jwks_publishes_current_key_only() {
        let manager = KeyManager::generate(test_config()).unwrap();
        manager.rotate().unwrap();

        let jwks = manager.jwks().unwrap();
        assert_eq!(jwks.keys.len(), 1);
        let jwk = &jwks.keys[0];
        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.alg, "RS256");
        assert_eq!(jwk.use_, "sig");
        assert_eq!(jwk.kid, manager.current_kid().unwrap());
        assert!(!jwk.n.is_empty());
        assert_eq!(jwk.e, "AQAB");
    }
}
