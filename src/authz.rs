use sqlx::SqlitePool;

use crate::errors::{AppError, AppResult};

/// Ownership decision: a user may act on a task when they authored it or
/// are among its assignees. Pure, so two calls with the same snapshot
/// always agree.
pub fn is_author_or_assignee(username: &str, author: &str, assignees: &[String]) -> bool {
    username == author || assignees.iter().any(|assignee| assignee == username)
}

/// Authorization guard for the self-service surface. Role-blind: callers
/// holding the admin bypass never reach this check.
///
/// The guard and the mutation that follows it are separate statements on
/// the pool, not one transaction; a concurrent reassignment between the
/// two can let a just-unassigned user's request through. Known gap.
pub async fn check_task_access(pool: &SqlitePool, task_id: i64, username: &str) -> AppResult<()> {
    let author: Option<String> = sqlx::query_scalar(
        "SELECT u.username FROM tasks t INNER JOIN users u ON u.id = t.author_id WHERE t.id = ?",
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?;

    let author = author.ok_or_else(|| AppError::not_found("Task not found"))?;

    let assignees: Vec<String> = sqlx::query_scalar(
        "SELECT u.username FROM task_assignees a INNER JOIN users u ON u.id = a.user_id WHERE a.task_id = ?",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await?;

    if is_author_or_assignee(username, &author, &assignees) {
        tracing::debug!(task_id, username, "task access allowed");
        Ok(())
    } else {
        tracing::debug!(task_id, username, author = %author, "task access denied");
        Err(AppError::forbidden("You can't modify this task"))
    }
}
