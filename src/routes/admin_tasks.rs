use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::AdminUser;
use crate::errors::{AppError, AppResult};
use crate::models::comment::{Comment, CommentCreateRequest};
use crate::models::task::{DbTask, Task, TaskCreateRequest, TaskPriority, TaskStatus, TaskUpdateRequest};
use crate::routes::tasks::{assemble_task, fetch_task, insert_comment, set_status};
use crate::users;
use crate::utils::utc_now;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct PriorityQuery {
    pub priority: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignQuery {
    pub username: String,
}

#[utoipa::path(
    get,
    path = "/tasks/admin",
    tag = "Admin tasks",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "All tasks", body = [Task]),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn list_all_tasks(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<Vec<Task>>> {
    let records = sqlx::query_as::<_, DbTask>(
        "SELECT t.id, t.title, t.description, t.status, t.priority, u.username AS author, t.created_at, t.updated_at
         FROM tasks t
         INNER JOIN users u ON u.id = t.author_id
         ORDER BY t.created_at DESC",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut tasks = Vec::with_capacity(records.len());
    for record in records {
        tasks.push(assemble_task(&state.pool, record).await?);
    }

    Ok(Json(tasks))
}

#[utoipa::path(
    post,
    path = "/tasks/admin",
    tag = "Admin tasks",
    security(("bearerAuth" = [])),
    request_body = TaskCreateRequest,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Author or assignee does not exist")
    )
)]
pub async fn create_task(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<TaskCreateRequest>,
) -> AppResult<(StatusCode, Json<Task>)> {
    if payload.title.trim().is_empty() {
        return Err(AppError::bad_request("Title cannot be empty"));
    }

    let status = match &payload.status {
        Some(value) => TaskStatus::parse(value)?,
        None => TaskStatus::Pending,
    };
    let priority = match &payload.priority {
        Some(value) => TaskPriority::parse(value)?,
        None => TaskPriority::Medium,
    };

    let author = users::find_by_username(&state.pool, &payload.author).await?;
    let assignee_ids = match &payload.assignees {
        Some(usernames) => Some(resolve_assignees(&state.pool, usernames).await?),
        None => None,
    };
    let now = utc_now();

    // The task row and its assignee set commit together; a failure in
    // either leaves no trace of the create.
    let mut tx = state.pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO tasks (title, description, status, priority, author_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(status)
    .bind(priority)
    .bind(author.id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let task_id = result.last_insert_rowid();

    if let Some(user_ids) = &assignee_ids {
        set_assignees(&mut tx, task_id, user_ids).await?;
    }

    tx.commit().await?;

    let task = fetch_task(&state.pool, task_id).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    put,
    path = "/tasks/admin/{id}",
    tag = "Admin tasks",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Task id")),
    request_body = TaskUpdateRequest,
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 404, description = "Task not found")
    )
)]
pub async fn update_task(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(payload): Json<TaskUpdateRequest>,
) -> AppResult<Json<Task>> {
    let current = fetch_task(&state.pool, id).await?;

    let title = match payload.title {
        Some(title) if title.trim().is_empty() => return Err(AppError::bad_request("Title cannot be empty")),
        Some(title) => title.trim().to_string(),
        None => current.title,
    };
    let description = payload.description.or(current.description);
    let status = match &payload.status {
        Some(value) => TaskStatus::parse(value)?,
        None => current.status,
    };
    let priority = match &payload.priority {
        Some(value) => TaskPriority::parse(value)?,
        None => current.priority,
    };

    let assignee_ids = match &payload.assignees {
        Some(usernames) => Some(resolve_assignees(&state.pool, usernames).await?),
        None => None,
    };

    // Field changes and the assignee replacement commit together; a failed
    // update must not keep any of them.
    let mut tx = state.pool.begin().await?;

    sqlx::query("UPDATE tasks SET title = ?, description = ?, status = ?, priority = ?, updated_at = ? WHERE id = ?")
        .bind(&title)
        .bind(&description)
        .bind(status)
        .bind(priority)
        .bind(utc_now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if let Some(user_ids) = &assignee_ids {
        set_assignees(&mut tx, id, user_ids).await?;
    }

    tx.commit().await?;

    let task = fetch_task(&state.pool, id).await?;
    Ok(Json(task))
}

#[utoipa::path(
    delete,
    path = "/tasks/admin/{id}",
    tag = "Admin tasks",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn delete_task(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let affected = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("Task not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    patch,
    path = "/tasks/admin/{id}/status",
    tag = "Admin tasks",
    security(("bearerAuth" = [])),
    params(
        ("id" = i64, Path, description = "Task id"),
        ("status" = String, Query, description = "New status value")
    ),
    responses((status = 200, description = "Status updated", body = Task))
)]
pub async fn change_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Query(query): Query<StatusQuery>,
) -> AppResult<Json<Task>> {
    let _ = fetch_task(&state.pool, id).await?;
    let status = TaskStatus::parse(&query.status)?;

    set_status(&state.pool, id, status).await?;

    let task = fetch_task(&state.pool, id).await?;
    Ok(Json(task))
}

#[utoipa::path(
    patch,
    path = "/tasks/admin/{id}/priority",
    tag = "Admin tasks",
    security(("bearerAuth" = [])),
    params(
        ("id" = i64, Path, description = "Task id"),
        ("priority" = String, Query, description = "New priority value")
    ),
    responses((status = 200, description = "Priority updated", body = Task))
)]
pub async fn change_priority(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Query(query): Query<PriorityQuery>,
) -> AppResult<Json<Task>> {
    let _ = fetch_task(&state.pool, id).await?;
    let priority = TaskPriority::parse(&query.priority)?;

    sqlx::query("UPDATE tasks SET priority = ?, updated_at = ? WHERE id = ?")
        .bind(priority)
        .bind(utc_now())
        .bind(id)
        .execute(&state.pool)
        .await?;

    let task = fetch_task(&state.pool, id).await?;
    Ok(Json(task))
}

#[utoipa::path(
    post,
    path = "/tasks/admin/{id}/assign",
    tag = "Admin tasks",
    security(("bearerAuth" = [])),
    params(
        ("id" = i64, Path, description = "Task id"),
        ("username" = String, Query, description = "User to assign")
    ),
    responses(
        (status = 200, description = "User assigned", body = Task),
        (status = 404, description = "Task or user not found")
    )
)]
pub async fn assign_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Query(query): Query<AssignQuery>,
) -> AppResult<Json<Task>> {
    let _ = fetch_task(&state.pool, id).await?;
    let user = users::find_by_username(&state.pool, &query.username).await?;

    sqlx::query("INSERT OR IGNORE INTO task_assignees (task_id, user_id) VALUES (?, ?)")
        .bind(id)
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    let task = fetch_task(&state.pool, id).await?;
    Ok(Json(task))
}

#[utoipa::path(
    post,
    path = "/tasks/admin/{id}/comments",
    tag = "Admin tasks",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Task id")),
    request_body = CommentCreateRequest,
    responses((status = 200, description = "Comment added", body = Comment))
)]
pub async fn add_comment(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(payload): Json<CommentCreateRequest>,
) -> AppResult<Json<Comment>> {
    let _ = fetch_task(&state.pool, id).await?;

    let comment = insert_comment(&state.pool, id, &admin, &payload.text).await?;
    Ok(Json(comment))
}

/// Resolve every username before any write, so an unknown name fails the
/// request with nothing mutated.
async fn resolve_assignees(pool: &SqlitePool, usernames: &[String]) -> AppResult<Vec<Uuid>> {
    let mut user_ids = Vec::with_capacity(usernames.len());
    for username in usernames {
        let user = users::find_by_username(pool, username).await?;
        user_ids.push(user.id);
    }

    Ok(user_ids)
}

async fn set_assignees(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    task_id: i64,
    user_ids: &[Uuid],
) -> AppResult<()> {
    sqlx::query("DELETE FROM task_assignees WHERE task_id = ?")
        .bind(task_id)
        .execute(&mut **tx)
        .await?;

    for user_id in user_ids {
        sqlx::query("INSERT OR IGNORE INTO task_assignees (task_id, user_id) VALUES (?, ?)")
            .bind(task_id)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}
