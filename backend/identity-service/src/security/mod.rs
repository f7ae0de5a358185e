/// Security module for authentication
///
/// - **password**: Argon2id hashing, bcrypt verification for stored hashes
/// - **access_token**: access token claims and signing via crypto-core
pub mod access_token;
pub mod password;

pub use access_token::{AccessTokenIssuer, IssuedAccessToken};
pub use password::{hash_password, verify_password};
