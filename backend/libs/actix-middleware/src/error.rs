//! Errors raised by the middlewares before a handler runs.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    UnsupportedMediaType(&'static str),

    /// Route wiring problem, e.g. RBAC mounted without authentication.
    #[error("{0}")]
    Internal(&'static str),
}

impl ResponseError for AuthFailure {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthFailure::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthFailure::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthFailure::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AuthFailure::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }))
    }
}
