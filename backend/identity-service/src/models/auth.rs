use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 3, max = 20, message = "username must be 3-20 characters"))]
    pub username: String,
    #[validate(length(min = 8, max = 20, message = "password must be 8-20 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1, message = "refresh token is required"))]
    pub refresh_token: String,
}

/// Token pair returned by login and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry (RFC 3339, UTC)
    pub expiration_date: DateTime<Utc>,
    pub token_type: String,
}
