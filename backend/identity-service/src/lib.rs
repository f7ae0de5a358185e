/// Identity Service Library
///
/// Password login, refresh-token rotation and JWT issuance for the Nova backend.
///
/// ## Modules
///
/// - `config`: Service configuration
/// - `db`: Users and refresh tokens, behind a unit-of-work seam
/// - `error`: Error types
/// - `http`: Actix routes and shared state
/// - `models`: Data models
/// - `security`: Access token issuance, password hashing
/// - `services`: Login and refresh flows
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod security;
pub mod services;

// Re-export commonly used types
pub use error::{IdentityError, Result};
pub use http::AppState;
