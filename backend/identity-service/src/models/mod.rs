/// Data models for authentication
pub mod auth;
pub mod refresh_token;
pub mod user;

pub use auth::{LoginRequest, RefreshTokenRequest, TokenResponse};
pub use refresh_token::RefreshToken;
pub use user::{AccountStatus, User};
