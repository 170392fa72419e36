use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::models::user::{DbUser, Role};
use crate::users;

/// Identity attached to the request extensions by [`authenticate`].
/// Extensions live for exactly one request, so the identity can never
/// leak into another request on a reused worker.
#[derive(Debug, Clone)]
struct CurrentUser(DbUser);

/// Request authentication gate. Runs once per request, before any handler:
///
/// - no `Authorization` header, or a non-Bearer scheme: the request passes
///   through anonymous; whether anonymous access is acceptable is decided
///   by the extractors on each route, not here
/// - `Bearer ` followed by nothing: 400, a malformed request rather than a
///   failed authentication
/// - token that does not verify: 401
/// - token whose subject no longer resolves to a user: 401, same as a bad
///   token — a deleted account must not keep access through a still-valid
///   token
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let bearer = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let Some(token) = bearer else {
        return Ok(next.run(request).await);
    };

    if token.trim().is_empty() {
        return Err(AppError::EmptyToken);
    }

    let claims = state.jwt.decode(token)?;

    let user = match users::find_by_email(&state.pool, &claims.sub).await {
        Ok(user) => user,
        Err(AppError::NotFound(_)) => {
            tracing::debug!(subject = %claims.sub, "token subject no longer resolves");
            return Err(AppError::InvalidToken);
        }
        Err(err) => return Err(err),
    };

    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}

/// Extractor for routes that require an authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub DbUser);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .map(|current| AuthUser(current.0))
            .ok_or_else(|| AppError::unauthorized("Authorization header missing"))
    }
}

/// Extractor for the admin-only operation set. Role alone authorizes these
/// routes; the ownership guard is never consulted for them.
#[derive(Debug, Clone)]
pub struct AdminUser(pub DbUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;

        if user.role != Role::Admin {
            tracing::debug!(username = %user.username, "admin route denied for non-admin");
            return Err(AppError::forbidden("Admin role required"));
        }

        Ok(AdminUser(user))
    }
}
