/// Authentication handlers
use actix_middleware::AuthenticatedUser;
use actix_web::{web, HttpResponse};

use super::AppState;
use crate::error::IdentityError;
use crate::models::{LoginRequest, RefreshTokenRequest};

/// Health check endpoint (no auth required)
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

/// POST /auth/login
pub async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, IdentityError> {
    let tokens = state.auth.login(&payload).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// POST /auth/refresh-token
pub async fn refresh_token(
    state: web::Data<AppState>,
    payload: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse, IdentityError> {
    let tokens = state.auth.refresh(&payload).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// GET /api/v1/me: identity resolved from the access token
pub async fn current_identity(user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(user)
}

/// Fallback for unknown paths
pub async fn not_found() -> Result<HttpResponse, IdentityError> {
    Err(IdentityError::NotFound(
        "The requested resource was not found".to_string(),
    ))
}

/// Fallback for known paths hit with an unsupported method
pub async fn method_not_allowed() -> Result<HttpResponse, IdentityError> {
    Err(IdentityError::MethodNotAllowed)
}
