/// Refresh token database operations
use crate::error::Result;
use crate::models::RefreshToken;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

pub async fn find_by_user_id(conn: &mut PgConnection, user_id: i64) -> Result<Option<RefreshToken>> {
    let token = sqlx::query_as::<_, RefreshToken>(
        "SELECT token, user_id, expiry_date FROM refresh_token WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;

    Ok(token)
}

/// Find a token and lock its row for the rest of the transaction
pub async fn find_by_token_for_update(
    conn: &mut PgConnection,
    token: &str,
) -> Result<Option<RefreshToken>> {
    let token = sqlx::query_as::<_, RefreshToken>(
        "SELECT token, user_id, expiry_date FROM refresh_token WHERE token = $1 FOR UPDATE",
    )
    .bind(token)
    .fetch_optional(conn)
    .await?;

    Ok(token)
}

/// Serialize refresh-token writes for one user until the transaction ends
pub async fn lock_user(conn: &mut PgConnection, user_id: i64) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(user_id)
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn delete_by_user_id(conn: &mut PgConnection, user_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM refresh_token WHERE user_id = $1")
        .bind(user_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

pub async fn insert(
    conn: &mut PgConnection,
    token: &str,
    user_id: i64,
    expiry_date: DateTime<Utc>,
) -> Result<RefreshToken> {
    let record = sqlx::query_as::<_, RefreshToken>(
        r#"
        INSERT INTO refresh_token (token, user_id, expiry_date)
        VALUES ($1, $2, $3)
        RETURNING token, user_id, expiry_date
        "#,
    )
    .bind(token)
    .bind(user_id)
    .bind(expiry_date)
    .fetch_one(conn)
    .await?;

    Ok(record)
}
