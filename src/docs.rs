use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::auth::register,
        routes::auth::login,
        routes::auth::me,
        routes::tasks::list_my_tasks,
        routes::tasks::get_task,
        routes::tasks::update_status,
        routes::tasks::add_comment,
        routes::admin_tasks::list_all_tasks,
        routes::admin_tasks::create_task,
        routes::admin_tasks::update_task,
        routes::admin_tasks::delete_task,
        routes::admin_tasks::change_status,
        routes::admin_tasks::change_priority,
        routes::admin_tasks::assign_user,
        routes::admin_tasks::add_comment,
    ),
    components(
        schemas(
            models::user::User,
            models::user::Role,
            models::user::AuthResponse,
            models::user::LoginRequest,
            models::user::RegisterRequest,
            models::task::Task,
            models::task::TaskStatus,
            models::task::TaskPriority,
            models::task::TaskCreateRequest,
            models::task::TaskUpdateRequest,
            models::comment::Comment,
            models::comment::CommentCreateRequest
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration and login endpoints"),
        (name = "Tasks", description = "Task endpoints for regular users"),
        (name = "Admin tasks", description = "Task endpoints for administrators")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_routes() -> Router {
    Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
