//! Core domain types shared across the crate.

pub mod client;
pub mod token;
pub mod user;

pub use client::{Client, ClientType, GrantType};
pub use token::IssuedToken;
pub use user::User;
