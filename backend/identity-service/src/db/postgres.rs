/// Postgres-backed units of work
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::{refresh_tokens, users};
use super::{AuthRepository, LastLoginRecorder, RefreshTokenStore, UnitOfWork, UserLookup};
use crate::error::Result;
use crate::models::{RefreshToken, User};

#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthRepository for PgAuthRepository {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// One database transaction. Dropping it without commit rolls back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UserLookup for PgUnitOfWork {
    async fn find_by_username(&mut self, username: &str) -> Result<Option<User>> {
        users::find_by_username(&mut self.tx, username).await
    }

    async fn find_by_id(&mut self, user_id: i64) -> Result<Option<User>> {
        users::find_by_id(&mut self.tx, user_id).await
    }
}

#[async_trait]
impl LastLoginRecorder for PgUnitOfWork {
    async fn record_last_login(&mut self, user_id: i64, at: DateTime<Utc>) -> Result<()> {
        users::update_last_login(&mut self.tx, user_id, at).await
    }
}

#[async_trait]
impl RefreshTokenStore for PgUnitOfWork {
    async fn get_by_user_id(&mut self, user_id: i64) -> Result<Option<RefreshToken>> {
        refresh_tokens::find_by_user_id(&mut self.tx, user_id).await
    }

    async fn get_by_token(&mut self, token: &str) -> Result<Option<RefreshToken>> {
        refresh_tokens::find_by_token_for_update(&mut self.tx, token).await
    }

    async fn create(&mut self, user_id: i64, expiry_date: DateTime<Utc>) -> Result<RefreshToken> {
        refresh_tokens::lock_user(&mut self.tx, user_id).await?;
        refresh_tokens::delete_by_user_id(&mut self.tx, user_id).await?;

        let token = crypto_core::random_token();
        refresh_tokens::insert(&mut self.tx, &token, user_id, expiry_date).await
    }

    async fn delete_by_user_id(&mut self, user_id: i64) -> Result<u64> {
        refresh_tokens::lock_user(&mut self.tx, user_id).await?;
        refresh_tokens::delete_by_user_id(&mut self.tx, user_id).await
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
