use sqlx::SqlitePool;

use crate::errors::{AppError, AppResult};
use crate::models::user::DbUser;

// Identity resolution is a plain lookup on every call; no caching, so a
// role change or account deletion is visible on the next request.

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<DbUser> {
    sqlx::query_as::<_, DbUser>(
        "SELECT id, username, email, password_hash, role, created_at, updated_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("User not found"))
}

pub async fn find_by_username(pool: &SqlitePool, username: &str) -> AppResult<DbUser> {
    sqlx::query_as::<_, DbUser>(
        "SELECT id, username, email, password_hash, role, created_at, updated_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("User not found"))
}
