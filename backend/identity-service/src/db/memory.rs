/// In-memory repository with transactional semantics
///
/// A unit of work holds the repository lock for its whole lifetime and
/// edits a private copy of the state; `commit` publishes the copy, anything
/// else discards it. Units of work are therefore fully serialized.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{AuthRepository, LastLoginRecorder, RefreshTokenStore, UnitOfWork, UserLookup};
use crate::error::{IdentityError, Result};
use crate::models::{RefreshToken, User};

#[derive(Debug, Clone, Default)]
struct State {
    users: HashMap<i64, User>,
    /// Keyed by user id: one live token per user.
    refresh_tokens: HashMap<i64, RefreshToken>,
}

#[derive(Clone, Default)]
pub struct InMemoryAuthRepository {
    state: Arc<Mutex<State>>,
    fail_last_login: Arc<AtomicBool>,
}

impl InMemoryAuthRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn user(&self, user_id: i64) -> Option<User> {
        self.state.lock().await.users.get(&user_id).cloned()
    }

    pub async fn insert_refresh_token(&self, token: RefreshToken) {
        self.state
            .lock()
            .await
            .refresh_tokens
            .insert(token.user_id, token);
    }

    pub async fn refresh_token_for(&self, user_id: i64) -> Option<RefreshToken> {
        self.state
            .lock()
            .await
            .refresh_tokens
            .get(&user_id)
            .cloned()
    }

    pub async fn refresh_token_count(&self) -> usize {
        self.state.lock().await.refresh_tokens.len()
    }

    /// Make every subsequent last-login update fail.
    pub fn fail_last_login_updates(&self, fail: bool) {
        self.fail_last_login.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuthRepository for InMemoryAuthRepository {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();

        Ok(Box::new(InMemoryUnitOfWork {
            guard,
            staged,
            fail_last_login: Arc::clone(&self.fail_last_login),
        }))
    }
}

pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<State>,
    staged: State,
    fail_last_login: Arc<AtomicBool>,
}

#[async_trait]
impl UserLookup for InMemoryUnitOfWork {
    async fn find_by_username(&mut self, username: &str) -> Result<Option<User>> {
        let wanted = username.to_lowercase();
        Ok(self
            .staged
            .users
            .values()
            .find(|user| user.username.to_lowercase() == wanted)
            .cloned())
    }

    async fn find_by_id(&mut self, user_id: i64) -> Result<Option<User>> {
        Ok(self.staged.users.get(&user_id).cloned())
    }
}

#[async_trait]
impl LastLoginRecorder for InMemoryUnitOfWork {
    async fn record_last_login(&mut self, user_id: i64, at: DateTime<Utc>) -> Result<()> {
        if self.fail_last_login.load(Ordering::SeqCst) {
            return Err(IdentityError::Database(
                "last login update failed".to_string(),
            ));
        }

        let user = self
            .staged
            .users
            .get_mut(&user_id)
            .ok_or_else(|| IdentityError::Database(format!("user {} not found", user_id)))?;
        user.last_login = Some(at);
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryUnitOfWork {
    async fn get_by_user_id(&mut self, user_id: i64) -> Result<Option<RefreshToken>> {
        Ok(self.staged.refresh_tokens.get(&user_id).cloned())
    }

    async fn get_by_token(&mut self, token: &str) -> Result<Option<RefreshToken>> {
        Ok(self
            .staged
            .refresh_tokens
            .values()
            .find(|record| record.token == token)
            .cloned())
    }

    async fn create(&mut self, user_id: i64, expiry_date: DateTime<Utc>) -> Result<RefreshToken> {
        let record = RefreshToken {
            token: crypto_core::random_token(),
            user_id,
            expiry_date,
        };
        self.staged.refresh_tokens.insert(user_id, record.clone());
        Ok(record)
    }

    async fn delete_by_user_id(&mut self, user_id: i64) -> Result<u64> {
        Ok(self.staged.refresh_tokens.remove(&user_id).map_or(0, |_| 1))
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryUnitOfWork {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(id: i64, username: &str) -> User {
        User {
            id,
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password_hash: String::new(),
            is_enabled: true,
            is_account_non_expired: true,
            is_account_non_locked: true,
            is_credentials_non_expired: true,
            is_deleted: false,
            last_login: None,
            roles: vec!["ROLE_USER".to_string()],
        }
    }

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let repo = InMemoryAuthRepository::new();
        repo.insert_user(user(1, "alice")).await;

        let mut uow = repo.begin().await.unwrap();
        uow.create(1, Utc::now() + Duration::hours(1)).await.unwrap();
        uow.rollback().await.unwrap();

        assert_eq!(repo.refresh_token_count().await, 0);
    }

    #[tokio::test]
    async fn test_drop_without_commit_discards_changes() {
        let repo = InMemoryAuthRepository::new();
        repo.insert_user(user(1, "alice")).await;

        {
            let mut uow = repo.begin().await.unwrap();
            uow.record_last_login(1, Utc::now()).await.unwrap();
        }

        assert!(repo.user(1).await.unwrap().last_login.is_none());
    }

    #[tokio::test]
    async fn test_create_replaces_existing_token() {
        let repo = InMemoryAuthRepository::new();
        let expiry = Utc::now() + Duration::hours(1);

        let mut uow = repo.begin().await.unwrap();
        let first = uow.create(7, expiry).await.unwrap();
        let second = uow.create(7, expiry).await.unwrap();
        uow.commit().await.unwrap();

        assert_ne!(first.token, second.token);
        assert_eq!(repo.refresh_token_count().await, 1);
        assert_eq!(repo.refresh_token_for(7).await, Some(second));
    }

    #[tokio::test]
    async fn test_get_by_user_id_returns_live_record() {
        let repo = InMemoryAuthRepository::new();
        let expiry = Utc::now() + Duration::hours(1);

        let mut uow = repo.begin().await.unwrap();
        assert!(uow.get_by_user_id(7).await.unwrap().is_none());

        uow.create(7, expiry).await.unwrap();
        let live = uow.create(7, expiry).await.unwrap();
        assert_eq!(uow.get_by_user_id(7).await.unwrap(), Some(live.clone()));
        assert_eq!(uow.get_by_token(&live.token).await.unwrap(), Some(live));
        uow.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_by_user_id_only_touches_that_user() {
        let repo = InMemoryAuthRepository::new();
        let expiry = Utc::now() + Duration::hours(1);

        let mut uow = repo.begin().await.unwrap();
        uow.create(7, expiry).await.unwrap();
        let other = uow.create(8, expiry).await.unwrap();

        assert_eq!(uow.delete_by_user_id(7).await.unwrap(), 1);
        assert!(uow.get_by_user_id(7).await.unwrap().is_none());
        assert_eq!(uow.delete_by_user_id(7).await.unwrap(), 0);
        assert_eq!(uow.get_by_user_id(8).await.unwrap(), Some(other.clone()));
        uow.commit().await.unwrap();

        assert_eq!(repo.refresh_token_count().await, 1);
        assert_eq!(repo.refresh_token_for(8).await, Some(other));
    }

    #[tokio::test]
    async fn test_delete_rolled_back_keeps_record() {
        let repo = InMemoryAuthRepository::new();
        let record = RefreshToken {
            token: "live".to_string(),
            user_id: 7,
            expiry_date: Utc::now() + Duration::hours(1),
        };
        repo.insert_refresh_token(record.clone()).await;

        let mut uow = repo.begin().await.unwrap();
        assert_eq!(uow.delete_by_user_id(7).await.unwrap(), 1);
        uow.rollback().await.unwrap();

        assert_eq!(repo.refresh_token_for(7).await, Some(record));
    }

    #[tokio::test]
    async fn test_username_lookup_is_case_insensitive() {
        let repo = InMemoryAuthRepository::new();
        repo.insert_user(user(1, "Admin")).await;

        let mut uow = repo.begin().await.unwrap();
        let found = uow.find_by_username("aDMIN").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(1));
        assert!(uow.find_by_username("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_injected_last_login_failure() {
        let repo = InMemoryAuthRepository::new();
        repo.insert_user(user(1, "alice")).await;
        repo.fail_last_login_updates(true);

        let mut uow = repo.begin().await.unwrap();
        assert!(uow.record_last_login(1, Utc::now()).await.is_err());
    }
}
