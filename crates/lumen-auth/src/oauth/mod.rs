//! OAuth 2.0 authorization flow: PKCE, authorization requests,
//! authorization codes, and the wire types for the token endpoint.

pub mod authorize;
pub mod code;
pub mod pkce;
pub mod service;
pub mod token;

pub use authorize::{AuthorizeRequest, AuthorizeResponse};
pub use code::AuthorizationCode;
pub use pkce::{
    CodeChallengeMethod, compute_s256_challenge, generate_verifier, validate_verifier,
    verify_challenge,
};
pub use service::{AuthorizationService, AuthorizeError, LoginPageContext};
pub use token::{TokenRequest, TokenResponse};
