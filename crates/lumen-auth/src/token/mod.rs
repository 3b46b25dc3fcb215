//! Token issuance and verification: JWT signing keys, OIDC ID tokens,
//! the grant-type state machine, introspection, and revocation.

pub mod introspection;
pub mod jwt;
pub mod oidc;
pub mod revocation;
pub mod service;

pub use introspection::IntrospectionResponse;
pub use jwt::{JwtError, KeyManager, spawn_rotation};
pub use oidc::{IdTokenClaims, OidcTokenService};
pub use revocation::RevocationRequest;
pub use service::TokenService;
