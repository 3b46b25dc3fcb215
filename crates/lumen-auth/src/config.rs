//! Authorization server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Top-level configuration for the authorization server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Issuer URL used in the `iss` claim of every issued token.
    pub issuer: String,

    /// Token lifetime configuration.
    pub tokens: TokenConfig,

    /// Signing key configuration.
    pub keys: KeyConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            tokens: TokenConfig::default(),
            keys: KeyConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Creates a configuration with the given issuer and defaults elsewhere.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            ..Self::default()
        }
    }

    /// Sets the access token lifetime.
    #[must_use]
    pub fn with_access_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.tokens.access_token_lifetime = lifetime;
        self
    }

    /// Sets the key rotation interval.
    #[must_use]
    pub fn with_key_rotation_interval(mut self, interval: Duration) -> Self {
        self.keys.rotation_interval = interval;
        self
    }

    /// Validates the configuration, returning an error for values that
    /// cannot produce a working server.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.issuer.is_empty() {
            return Err(AuthError::configuration("issuer must not be empty"));
        }
        if self.issuer.ends_with('/') {
            return Err(AuthError::configuration(
                "issuer must not have a trailing slash",
            ));
        }
        if self.tokens.access_token_lifetime.is_zero() {
            return Err(AuthError::configuration(
                "access token lifetime must be greater than zero",
            ));
        }
        if self.tokens.authorization_code_lifetime.is_zero() {
            return Err(AuthError::configuration(
                "authorization code lifetime must be greater than zero",
            ));
        }
        if self.tokens.refresh_token_lifetime < self.tokens.access_token_lifetime {
            return Err(AuthError::configuration(
                "refresh token lifetime must be at least the access token lifetime",
            ));
        }
        if self.keys.rsa_bits < 2048 {
            return Err(AuthError::configuration(
                "RSA key size must be at least 2048 bits",
            ));
        }
        Ok(())
    }
}

/// Lifetimes for the tokens the server issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// How long an access token remains valid.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// How long a refresh token remains valid.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// How long an authorization code may sit unredeemed.
    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: Duration::from_secs(3600),
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 3600),
            authorization_code_lifetime: Duration::from_secs(600),
        }
    }
}

/// Signing key generation and rotation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// RSA modulus size in bits.
    pub rsa_bits: usize,

    /// How often the signing key is rotated.
    #[serde(with = "humantime_serde")]
    pub rotation_interval: Duration,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            rsa_bits: 2048,
            rotation_interval: Duration::from_secs(24 * 3600),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AuthConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tokens.access_token_lifetime.as_secs(), 3600);
        assert_eq!(config.tokens.authorization_code_lifetime.as_secs(), 600);
        assert_eq!(config.keys.rsa_bits, 2048);
    }

    #[test]
    fn test_builder_methods() {
        let config = AuthConfig::new("https://auth.example.com")
            .with_access_token_lifetime(Duration::from_secs(1800))
            .with_key_rotation_interval(Duration::from_secs(3600));
        assert_eq!(config.issuer, "https://auth.example.com");
        assert_eq!(config.tokens.access_token_lifetime.as_secs(), 1800);
        assert_eq!(config.keys.rotation_interval.as_secs(), 3600);
    }

    #[test]
    fn test_validate_rejects_empty_issuer() {
        let config = AuthConfig::new("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_trailing_slash() {
        let config = AuthConfig::new("https://auth.example.com/");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_weak_keys() {
        let mut config = AuthConfig::default();
        config.keys.rsa_bits = 1024;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_short_refresh_lifetime() {
        let mut config = AuthConfig::default();
        config.tokens.refresh_token_lifetime = Duration::from_secs(60);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_deserializes_humantime() {
        let json = r#"{
            "issuer": "https://auth.example.com",
            "tokens": {
                "access_token_lifetime": "1h",
                "refresh_token_lifetime": "30d",
                "authorization_code_lifetime": "10m"
            }
        }"#;
        let config: AuthConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.tokens.access_token_lifetime.as_secs(), 3600);
        assert_eq!(config.tokens.authorization_code_lifetime.as_secs(), 600);
    }
}
