use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Opaque refresh token record; at most one per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RefreshToken {
    pub token: String,
    pub user_id: i64,
    pub expiry_date: DateTime<Utc>,
}

impl RefreshToken {
    /// A token is expired once `now` is past its expiry date.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry_date
    }
}
