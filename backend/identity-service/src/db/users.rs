/// User database operations for identity-service
use crate::error::Result;
use crate::models::User;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

/// Find user by username, case-insensitive (excluding soft-deleted users)
pub async fn find_by_username(conn: &mut PgConnection, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.username, u.email, u.password,
               u.is_enabled, u.is_account_non_expired, u.is_account_non_locked,
               u.is_credentials_non_expired, u.is_deleted, u.last_login,
               COALESCE(
                   array_agg(r.name::text) FILTER (WHERE r.name IS NOT NULL),
                   ARRAY[]::text[]
               ) AS roles
        FROM users u
        LEFT JOIN user_roles ur ON ur.user_id = u.id
        LEFT JOIN roles r ON r.id = ur.role_id
        WHERE lower(u.username) = lower($1) AND u.deleted_at IS NULL
        GROUP BY u.id
        "#,
    )
    .bind(username)
    .fetch_optional(conn)
    .await?;

    Ok(user)
}

/// Find user by ID (excluding soft-deleted users)
pub async fn find_by_id(conn: &mut PgConnection, user_id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.username, u.email, u.password,
               u.is_enabled, u.is_account_non_expired, u.is_account_non_locked,
               u.is_credentials_non_expired, u.is_deleted, u.last_login,
               COALESCE(
                   array_agg(r.name::text) FILTER (WHERE r.name IS NOT NULL),
                   ARRAY[]::text[]
               ) AS roles
        FROM users u
        LEFT JOIN user_roles ur ON ur.user_id = u.id
        LEFT JOIN roles r ON r.id = ur.role_id
        WHERE u.id = $1 AND u.deleted_at IS NULL
        GROUP BY u.id
        "#,
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;

    Ok(user)
}

/// Record a successful sign-in. Fails if the user row is gone.
pub async fn update_last_login(
    conn: &mut PgConnection,
    user_id: i64,
    at: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query("UPDATE users SET last_login = $1, updated_at = $1 WHERE id = $2")
        .bind(at)
        .bind(user_id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound.into());
    }

    Ok(())
}
