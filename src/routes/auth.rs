use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::auth::credentials;
use crate::auth::AuthUser;
use crate::errors::AppResult;
use crate::models::user::{AuthResponse, LoginRequest, RegisterRequest, User};

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let user = credentials::register(&state.pool, &payload).await?;
    let token = state.jwt.encode(&user.email)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = credentials::authenticate(&state.pool, &payload.email, &payload.password).await?;
    let token = state.jwt.encode(&user.email)?;

    Ok(Json(AuthResponse { token }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses((status = 200, description = "Current user", body = User))
)]
pub async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(User::from(user))
}
