#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt;
use uuid::Uuid;

use taskboard::jwt::JwtConfig;
use taskboard::utils::{hash_password, utc_now};

pub const TEST_SECRET: &str = "test-secret";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub async fn spawn_app() -> Result<TestApp> {
    spawn_app_with_secret(TEST_SECRET).await
}

pub async fn spawn_app_with_secret(secret: &str) -> Result<TestApp> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    let app = taskboard::create_app_with(pool.clone(), JwtConfig::new(secret, 24));

    Ok(TestApp {
        app,
        pool,
        _dir: dir,
    })
}

pub async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Result<Response> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    Ok(app.clone().oneshot(request).await?)
}

pub async fn body_json(response: Response) -> Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Register a user through the API and return their token.
pub async fn register(app: &Router, username: &str, email: &str, password: &str) -> Result<String> {
    let payload = json!({
        "username": username,
        "email": email,
        "password": password
    });

    let response = request(app, "POST", "/auth/register", None, Some(payload)).await?;
    assert_eq!(response.status(), StatusCode::CREATED, "registration should succeed");

    let body = body_json(response).await?;
    Ok(body["token"].as_str().context("token missing")?.to_string())
}

pub async fn login(app: &Router, email: &str, password: &str) -> Result<Response> {
    let payload = json!({ "email": email, "password": password });
    request(app, "POST", "/auth/login", None, Some(payload)).await
}

/// Registration can never yield an admin, so tests provision one directly
/// in storage and then log in through the API.
pub async fn create_admin(
    test_app: &TestApp,
    username: &str,
    email: &str,
    password: &str,
) -> Result<String> {
    let now = utc_now();
    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, 'ADMIN', ?, ?)",
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(hash_password(password)?)
    .bind(now)
    .bind(now)
    .execute(&test_app.pool)
    .await?;

    let response = login(&test_app.app, email, password).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await?;
    Ok(body["token"].as_str().context("token missing")?.to_string())
}

/// Create a task via the admin surface and return its id.
pub async fn create_task(
    app: &Router,
    admin_token: &str,
    author: &str,
    assignees: &[&str],
) -> Result<i64> {
    let payload = json!({
        "title": "Implement user auth",
        "description": "Develop the authentication module",
        "status": "PENDING",
        "priority": "HIGH",
        "author": author,
        "assignees": assignees
    });

    let response = request(app, "POST", "/tasks/admin", Some(admin_token), Some(payload)).await?;
    assert_eq!(response.status(), StatusCode::CREATED, "task creation should succeed");

    let body = body_json(response).await?;
    body["id"].as_i64().context("task id missing")
}
