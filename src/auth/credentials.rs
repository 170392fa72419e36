use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::user::{DbUser, RegisterRequest, Role};
use crate::users;
use crate::utils::{hash_password, utc_now, verify_password};

/// Check a plaintext password against the stored verifier for the claimed
/// email. Unknown email and wrong password fail identically.
pub async fn authenticate(pool: &SqlitePool, email: &str, password: &str) -> AppResult<DbUser> {
    let user = match users::find_by_email(pool, email).await {
        Ok(user) => user,
        Err(AppError::NotFound(_)) => return Err(AppError::BadCredentials),
        Err(err) => return Err(err),
    };

    if !verify_password(password, &user.password_hash)? {
        return Err(AppError::BadCredentials);
    }

    Ok(user)
}

/// Create a new identity. Only the argon2 hash of the password is stored,
/// and the role is always `USER` regardless of anything the client sent.
pub async fn register(pool: &SqlitePool, payload: &RegisterRequest) -> AppResult<DbUser> {
    match users::find_by_username(pool, &payload.username).await {
        Ok(_) => return Err(AppError::bad_request("Username is already taken")),
        Err(AppError::NotFound(_)) => {}
        Err(err) => return Err(err),
    }

    ensure_email_available(pool, &payload.email).await?;

    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let user_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(password_hash)
    .bind(Role::User)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    users::find_by_email(pool, &payload.email).await
}

async fn ensure_email_available(pool: &SqlitePool, email: &str) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    Ok(())
}
