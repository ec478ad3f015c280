pub mod auth;
pub mod client;
pub mod push;
pub mod suggest;

pub use auth::{TokenPair, TokenStore};
pub use client::ApiClient;
