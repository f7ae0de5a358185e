/// Service layer for identity-service
///
/// - Authentication: login and refresh-token rotation
pub mod auth;

pub use auth::AuthService;
