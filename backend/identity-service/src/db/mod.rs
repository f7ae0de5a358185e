/// Persistence contracts for the authentication core
///
/// Every login or refresh runs inside one [`UnitOfWork`]: user lookup,
/// refresh-token rotation and the last-login update either all commit or
/// all roll back.
///
/// - `users`: user queries (Postgres)
/// - `refresh_tokens`: refresh token queries (Postgres)
/// - `postgres`: transaction-backed [`AuthRepository`]
/// - `memory`: in-process [`AuthRepository`] for tests and local runs
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{RefreshToken, User};

pub mod memory;
pub mod postgres;
pub mod refresh_tokens;
pub mod users;

pub use memory::InMemoryAuthRepository;
pub use postgres::PgAuthRepository;

#[async_trait]
pub trait UserLookup: Send {
    /// Case-insensitive username match.
    async fn find_by_username(&mut self, username: &str) -> Result<Option<User>>;

    async fn find_by_id(&mut self, user_id: i64) -> Result<Option<User>>;
}

#[async_trait]
pub trait LastLoginRecorder: Send {
    async fn record_last_login(&mut self, user_id: i64, at: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
pub trait RefreshTokenStore: Send {
    async fn get_by_user_id(&mut self, user_id: i64) -> Result<Option<RefreshToken>>;

    /// Implementations lock the returned record until the unit of work ends.
    async fn get_by_token(&mut self, token: &str) -> Result<Option<RefreshToken>>;

    /// Replace the user's record with a freshly generated token.
    ///
    /// Delete and insert happen in the current unit of work and are
    /// serialized per user.
    async fn create(&mut self, user_id: i64, expiry_date: DateTime<Utc>) -> Result<RefreshToken>;

    async fn delete_by_user_id(&mut self, user_id: i64) -> Result<u64>;
}

/// One transaction spanning user lookups, last-login updates and
/// refresh-token changes.
#[async_trait]
pub trait UnitOfWork: UserLookup + LastLoginRecorder + RefreshTokenStore {
    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait AuthRepository: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}
