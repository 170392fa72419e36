use std::sync::Arc;

use axum::http::Method;
use axum::middleware;
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::gate;
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{admin_tasks, auth, tasks};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    Ok(create_app_with(pool, jwt_config))
}

pub fn create_app_with(pool: SqlitePool, jwt: JwtConfig) -> Router {
    let state = AppState::new(pool, jwt);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    // Admin operation set: role is the whole authorization, enforced by the
    // AdminUser extractor; the ownership guard is never consulted here.
    let admin_task_routes = Router::new()
        .route("/", get(admin_tasks::list_all_tasks))
        .route("/", post(admin_tasks::create_task))
        .route("/:id", put(admin_tasks::update_task))
        .route("/:id", delete(admin_tasks::delete_task))
        .route("/:id/status", patch(admin_tasks::change_status))
        .route("/:id/priority", patch(admin_tasks::change_priority))
        .route("/:id/assign", post(admin_tasks::assign_user))
        .route("/:id/comments", post(admin_tasks::add_comment));

    // Self-service set: requires authentication plus an ownership check in
    // each handler.
    let task_routes = Router::new()
        .route("/", get(tasks::list_my_tasks))
        .route("/:id", get(tasks::get_task))
        .route("/:id/status", patch(tasks::update_status))
        .route("/:id/comments", post(tasks::add_comment));

    Router::new()
        .nest("/auth", auth_routes)
        .nest("/tasks/admin", admin_task_routes)
        .nest("/tasks", task_routes)
        .layer(middleware::from_fn_with_state(state.clone(), gate::authenticate))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
