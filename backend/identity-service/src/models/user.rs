use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

pub const ROLE_USER: &str = "ROLE_USER";
pub const ROLE_MODERATOR: &str = "ROLE_MODERATOR";
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";

/// User model as read by the authentication core.
///
/// Roles are aggregated from `user_roles`/`roles` in the same query.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[sqlx(rename = "password")]
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_enabled: bool,
    pub is_account_non_expired: bool,
    pub is_account_non_locked: bool,
    pub is_credentials_non_expired: bool,
    pub is_deleted: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub roles: Vec<String>,
}

/// Reasons an account may not sign in, checked in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Disabled,
    Expired,
    Locked,
    CredentialsExpired,
    Deleted,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            AccountStatus::Disabled => "user account is not enabled",
            AccountStatus::Expired => "user account is expired",
            AccountStatus::Locked => "user account is locked",
            AccountStatus::CredentialsExpired => "user credentials are expired",
            AccountStatus::Deleted => "user account is deleted",
        };
        f.write_str(msg)
    }
}

impl User {
    /// Check whether the account may sign in
    pub fn check_account_status(&self) -> Result<(), AccountStatus> {
        if !self.is_enabled {
            return Err(AccountStatus::Disabled);
        }
        if !self.is_account_non_expired {
            return Err(AccountStatus::Expired);
        }
        if !self.is_account_non_locked {
            return Err(AccountStatus::Locked);
        }
        if !self.is_credentials_non_expired {
            return Err(AccountStatus::CredentialsExpired);
        }
        if self.is_deleted {
            return Err(AccountStatus::Deleted);
        }
        Ok(())
    }
}
