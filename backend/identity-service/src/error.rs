use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use crypto_core::TokenError;
use thiserror::Error;

use crate::models::AccountStatus;

pub type Result<T> = std::result::Result<T, IdentityError>;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    AccountUnavailable(AccountStatus),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Database error: {0}")]
    Database(String),

    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Coarse classification used for status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    NotFound,
    MethodNotAllowed,
    Internal,
}

impl IdentityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IdentityError::BadRequest(_) | IdentityError::Validation(_) => ErrorKind::BadRequest,
            IdentityError::InvalidCredentials
            | IdentityError::AccountUnavailable(_)
            | IdentityError::Unauthorized(_) => ErrorKind::Unauthorized,
            IdentityError::NotFound(_) => ErrorKind::NotFound,
            IdentityError::MethodNotAllowed => ErrorKind::MethodNotAllowed,
            IdentityError::Database(_) | IdentityError::JwtError(_) | IdentityError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        IdentityError::Unauthorized(msg.into())
    }
}

impl ResponseError for IdentityError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // Don't leak internal details
        let error_msg = match self.kind() {
            ErrorKind::Internal => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        HttpResponse::build(status).json(serde_json::json!({
            "error": error_msg,
            "status": status.as_u16(),
        }))
    }
}

// Conversions from external error types
impl From<sqlx::Error> for IdentityError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        IdentityError::Database(err.to_string())
    }
}

impl From<TokenError> for IdentityError {
    fn from(err: TokenError) -> Self {
        tracing::error!("JWT error: {}", err);
        IdentityError::JwtError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for IdentityError {
    fn from(err: validator::ValidationErrors) -> Self {
        IdentityError::Validation(err.to_string())
    }
}

impl From<AccountStatus> for IdentityError {
    fn from(status: AccountStatus) -> Self {
        IdentityError::AccountUnavailable(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_json(err: IdentityError) -> serde_json::Value {
        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            IdentityError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            IdentityError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            IdentityError::AccountUnavailable(AccountStatus::Locked).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            IdentityError::NotFound("gone".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            IdentityError::MethodNotAllowed.status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            IdentityError::Database("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_rt::test]
    async fn test_internal_details_are_hidden() {
        let json = body_json(IdentityError::Database("relation users does not exist".into())).await;
        assert_eq!(json["error"], "Internal server error");
        assert_eq!(json["status"], 500);
    }

    #[actix_rt::test]
    async fn test_unauthorized_message_is_passed_through() {
        let json = body_json(IdentityError::unauthorized("refresh token not found")).await;
        assert_eq!(json["error"], "refresh token not found");
        assert_eq!(json["status"], 401);

        let json = body_json(AccountStatus::Disabled.into()).await;
        assert_eq!(json["error"], "user account is not enabled");
    }

    #[test]
    fn test_token_errors_are_internal() {
        let err: IdentityError = TokenError::Signing("bad key".into()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
