//! Shared fixtures for identity-service integration tests
#![allow(dead_code)]

use chrono::Duration;
use crypto_core::test_keys::TEST_SECRET;
use crypto_core::{KeyMaterial, TokenCodec, ValidationPolicy};
use identity_service::db::InMemoryAuthRepository;
use identity_service::models::user::{ROLE_ADMIN, ROLE_USER};
use identity_service::models::User;
use identity_service::security::{hash_password, AccessTokenIssuer};
use identity_service::services::AuthService;
use std::sync::Arc;

pub const ISSUER: &str = "identity-service";
pub const AUDIENCE: &str = "nova-api";
pub const PASSWORD: &str = "P@ssw0rd";

pub fn codec() -> Arc<dyn TokenCodec> {
    KeyMaterial::shared_secret(TEST_SECRET)
        .unwrap()
        .into_codec(&ValidationPolicy::new(ISSUER, AUDIENCE))
        .unwrap()
}

pub fn active_user(id: i64, username: &str, password_hash: &str) -> User {
    User {
        id,
        username: username.to_string(),
        email: format!("{}@example.com", username.to_lowercase()),
        password_hash: password_hash.to_string(),
        is_enabled: true,
        is_account_non_expired: true,
        is_account_non_locked: true,
        is_credentials_non_expired: true,
        is_deleted: false,
        last_login: None,
        roles: vec![ROLE_USER.to_string()],
    }
}

pub struct Fixture {
    pub repo: InMemoryAuthRepository,
    pub codec: Arc<dyn TokenCodec>,
    pub service: AuthService,
    pub password_hash: String,
}

impl Fixture {
    /// Repository seeded with `alice` (ROLE_USER) and `Admin` (ROLE_USER, ROLE_ADMIN).
    pub async fn new() -> Self {
        Self::with_token_type("Bearer").await
    }

    pub async fn with_token_type(token_type: &str) -> Self {
        let repo = InMemoryAuthRepository::new();
        let password_hash = hash_password(PASSWORD).unwrap();

        repo.insert_user(active_user(1, "alice", &password_hash)).await;

        let mut admin = active_user(2, "Admin", &password_hash);
        admin.roles = vec![ROLE_ADMIN.to_string(), ROLE_USER.to_string()];
        repo.insert_user(admin).await;

        let codec = codec();
        let service = AuthService::new(
            Arc::new(repo.clone()),
            AccessTokenIssuer::new(Arc::clone(&codec), ISSUER, AUDIENCE, Duration::hours(1)),
            Duration::hours(24),
            token_type,
        );

        Self {
            repo,
            codec,
            service,
            password_hash,
        }
    }
}
