//! Storage traits and the in-memory backend.
//!
//! Services hold `Arc<dyn ...Storage>` so a persistent backend can replace
//! the in-memory one without touching the flow logic.

pub mod client;
pub mod code;
pub mod memory;
pub mod token;
pub mod user;

pub use client::ClientStorage;
pub use code::CodeStorage;
pub use memory::{
    InMemoryClientStorage, InMemoryCodeStorage, InMemoryTokenStorage, InMemoryUserStorage,
};
pub use token::TokenStorage;
pub use user::UserStorage;
