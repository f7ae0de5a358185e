/// Login and refresh-token flows
///
/// Each call runs in exactly one unit of work. Any failing step, including
/// the last-login update, rolls back the refresh-token rotation as well.
use chrono::{DateTime, Duration, Utc};
use crypto_core::TokenCodec;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::config::JwtSettings;
use crate::db::{AuthRepository, UnitOfWork};
use crate::error::{IdentityError, Result};
use crate::models::{LoginRequest, RefreshTokenRequest, TokenResponse, User};
use crate::security::{password, AccessTokenIssuer};

#[derive(Clone)]
pub struct AuthService {
    repository: Arc<dyn AuthRepository>,
    issuer: AccessTokenIssuer,
    refresh_token_ttl: Duration,
    token_type: String,
}

impl AuthService {
    pub fn new(
        repository: Arc<dyn AuthRepository>,
        issuer: AccessTokenIssuer,
        refresh_token_ttl: Duration,
        token_type: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            issuer,
            refresh_token_ttl,
            token_type: token_type.into(),
        }
    }

    pub fn from_settings(
        repository: Arc<dyn AuthRepository>,
        codec: Arc<dyn TokenCodec>,
        settings: &JwtSettings,
    ) -> Self {
        Self::new(
            repository,
            AccessTokenIssuer::from_settings(codec, settings),
            settings.refresh_token_ttl(),
            settings.token_type.clone(),
        )
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<TokenResponse> {
        self.login_at(request, Utc::now()).await
    }

    /// Authenticate with username and password at a fixed instant.
    pub async fn login_at(&self, request: &LoginRequest, now: DateTime<Utc>) -> Result<TokenResponse> {
        request.validate()?;

        let mut uow = self.repository.begin().await?;
        let outcome = self.login_in(uow.as_mut(), request, now).await;
        finish(uow, outcome).await
    }

    pub async fn refresh(&self, request: &RefreshTokenRequest) -> Result<TokenResponse> {
        self.refresh_at(request, Utc::now()).await
    }

    /// Exchange a refresh token for a new token pair at a fixed instant.
    pub async fn refresh_at(
        &self,
        request: &RefreshTokenRequest,
        now: DateTime<Utc>,
    ) -> Result<TokenResponse> {
        request.validate()?;

        let mut uow = self.repository.begin().await?;
        let outcome = self.refresh_in(uow.as_mut(), &request.refresh_token, now).await;
        finish(uow, outcome).await
    }

    async fn login_in(
        &self,
        uow: &mut dyn UnitOfWork,
        request: &LoginRequest,
        now: DateTime<Utc>,
    ) -> Result<TokenResponse> {
        let user = uow
            .find_by_username(&request.username)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        if let Err(status) = user.check_account_status() {
            warn!(user_id = user.id, reason = %status, "Login rejected");
            return Err(status.into());
        }

        if !verify_password(&request.password, &user.password_hash).await? {
            warn!(user_id = user.id, "Login failed: invalid password");
            return Err(IdentityError::InvalidCredentials);
        }

        let response = self.complete_sign_in(uow, &user, now).await?;
        info!(user_id = user.id, "User logged in");
        Ok(response)
    }

    async fn refresh_in(
        &self,
        uow: &mut dyn UnitOfWork,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenResponse> {
        let record = uow
            .get_by_token(refresh_token)
            .await?
            .ok_or_else(|| IdentityError::unauthorized("refresh token not found"))?;

        if record.is_expired(now) {
            warn!(user_id = record.user_id, "Refresh rejected: token expired");
            return Err(IdentityError::unauthorized("refresh token is expired"));
        }

        let user = uow
            .find_by_id(record.user_id)
            .await?
            .ok_or_else(|| IdentityError::unauthorized("user not found"))?;

        if let Err(status) = user.check_account_status() {
            warn!(user_id = user.id, reason = %status, "Refresh rejected");
            return Err(status.into());
        }

        let response = self.complete_sign_in(uow, &user, now).await?;
        info!(user_id = user.id, "Token refreshed");
        Ok(response)
    }

    /// Issue an access token, rotate the refresh token, record the login.
    async fn complete_sign_in(
        &self,
        uow: &mut dyn UnitOfWork,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<TokenResponse> {
        let access = self.issuer.issue(user, now)?;
        let refresh_expiry = now
            .checked_add_signed(self.refresh_token_ttl)
            .ok_or_else(|| IdentityError::Internal("refresh token expiry out of range".to_string()))?;
        let refresh = uow.create(user.id, refresh_expiry).await?;
        uow.record_last_login(user.id, now).await?;

        Ok(TokenResponse {
            access_token: access.token,
            refresh_token: refresh.token,
            expiration_date: access.expires_at,
            token_type: self.token_type.clone(),
        })
    }
}

/// Commit on success, roll back on failure.
async fn finish<T>(uow: Box<dyn UnitOfWork>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                tracing::error!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

/// Password hashing is CPU bound; keep it off the async workers.
async fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let password = password.to_owned();
    let password_hash = password_hash.to_owned();

    tokio::task::spawn_blocking(move || password::verify_password(&password, &password_hash))
        .await
        .map_err(|e| IdentityError::Internal(format!("Password verification task failed: {}", e)))?
}
