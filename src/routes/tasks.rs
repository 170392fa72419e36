use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz;
use crate::errors::{AppError, AppResult};
use crate::auth::AuthUser;
use crate::models::comment::{Comment, CommentCreateRequest};
use crate::models::task::{DbTask, Task, TaskStatus};
use crate::models::user::DbUser;
use crate::utils::utc_now;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: String,
}

#[utoipa::path(
    get,
    path = "/tasks",
    tag = "Tasks",
    security(("bearerAuth" = [])),
    responses((status = 200, description = "Tasks the caller authored or is assigned to", body = [Task]))
)]
pub async fn list_my_tasks(State(state): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<Vec<Task>>> {
    let records = sqlx::query_as::<_, DbTask>(
        "SELECT t.id, t.title, t.description, t.status, t.priority, u.username AS author, t.created_at, t.updated_at
         FROM tasks t
         INNER JOIN users u ON u.id = t.author_id
         WHERE t.author_id = ? OR t.id IN (SELECT task_id FROM task_assignees WHERE user_id = ?)
         ORDER BY t.created_at DESC",
    )
    .bind(user.id)
    .bind(user.id)
    .fetch_all(&state.pool)
    .await?;

    let mut tasks = Vec::with_capacity(records.len());
    for record in records {
        tasks.push(assemble_task(&state.pool, record).await?);
    }

    Ok(Json(tasks))
}

#[utoipa::path(
    get,
    path = "/tasks/{id}",
    tag = "Tasks",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task detail", body = Task),
        (status = 403, description = "Caller is neither author nor assignee"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn get_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Task>> {
    authz::check_task_access(&state.pool, id, &user.username).await?;

    let task = fetch_task(&state.pool, id).await?;
    Ok(Json(task))
}

#[utoipa::path(
    patch,
    path = "/tasks/{id}/status",
    tag = "Tasks",
    security(("bearerAuth" = [])),
    params(
        ("id" = i64, Path, description = "Task id"),
        ("status" = String, Query, description = "New status value")
    ),
    responses(
        (status = 200, description = "Status updated", body = Task),
        (status = 400, description = "Invalid status value"),
        (status = 403, description = "Caller is neither author nor assignee")
    )
)]
pub async fn update_status(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Query(query): Query<StatusQuery>,
) -> AppResult<Json<Task>> {
    // Guard strictly before the write.
    authz::check_task_access(&state.pool, id, &user.username).await?;

    let status = TaskStatus::parse(&query.status)?;
    set_status(&state.pool, id, status).await?;

    let task = fetch_task(&state.pool, id).await?;
    Ok(Json(task))
}

#[utoipa::path(
    post,
    path = "/tasks/{id}/comments",
    tag = "Tasks",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Task id")),
    request_body = CommentCreateRequest,
    responses(
        (status = 200, description = "Comment added", body = Comment),
        (status = 403, description = "Caller is neither author nor assignee")
    )
)]
pub async fn add_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<CommentCreateRequest>,
) -> AppResult<Json<Comment>> {
    authz::check_task_access(&state.pool, id, &user.username).await?;

    let comment = insert_comment(&state.pool, id, &user, &payload.text).await?;
    Ok(Json(comment))
}

/// Load a task with its author username, assignee usernames and comments.
pub(crate) async fn fetch_task(pool: &SqlitePool, id: i64) -> AppResult<Task> {
    let record = sqlx::query_as::<_, DbTask>(
        "SELECT t.id, t.title, t.description, t.status, t.priority, u.username AS author, t.created_at, t.updated_at
         FROM tasks t
         INNER JOIN users u ON u.id = t.author_id
         WHERE t.id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Task not found"))?;

    assemble_task(pool, record).await
}

pub(crate) async fn assemble_task(pool: &SqlitePool, record: DbTask) -> AppResult<Task> {
    let assignees: Vec<String> = sqlx::query_scalar(
        "SELECT u.username FROM task_assignees a INNER JOIN users u ON u.id = a.user_id WHERE a.task_id = ? ORDER BY u.username",
    )
    .bind(record.id)
    .fetch_all(pool)
    .await?;

    let comments = sqlx::query_as::<_, Comment>(
        "SELECT c.id, c.text, u.username AS author, c.created_at
         FROM comments c
         INNER JOIN users u ON u.id = c.author_id
         WHERE c.task_id = ?
         ORDER BY c.created_at ASC",
    )
    .bind(record.id)
    .fetch_all(pool)
    .await?;

    Ok(Task::from_parts(record, assignees, comments))
}

pub(crate) async fn set_status(pool: &SqlitePool, id: i64, status: TaskStatus) -> AppResult<()> {
    sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(utc_now())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub(crate) async fn insert_comment(
    pool: &SqlitePool,
    task_id: i64,
    author: &DbUser,
    text: &str,
) -> AppResult<Comment> {
    let trimmed = text.trim();
    // Character count, not byte length; non-ASCII comments count per character.
    let length = trimmed.chars().count();
    if !(2..=500).contains(&length) {
        return Err(AppError::bad_request("Comment must be between 2 and 500 characters"));
    }

    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query("INSERT INTO comments (id, task_id, author_id, text, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(id)
        .bind(task_id)
        .bind(author.id)
        .bind(trimmed)
        .bind(now)
        .execute(pool)
        .await?;

    Ok(Comment {
        id,
        text: trimmed.to_string(),
        author: author.username.clone(),
        created_at: now,
    })
}
