mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{body_json, create_admin, create_task, register, request, spawn_app};

#[tokio::test]
async fn regular_user_is_locked_out_of_the_admin_surface() -> Result<()> {
    let test_app = spawn_app().await?;
    let user = register(&test_app.app, "ada", "ada@example.com", "password123").await?;
    let admin = create_admin(&test_app, "root", "root@example.com", "password123").await?;
    let task_id = create_task(&test_app.app, &admin, "ada", &[]).await?;

    let attempts = [
        ("GET", "/tasks/admin".to_string()),
        ("POST", "/tasks/admin".to_string()),
        ("PUT", format!("/tasks/admin/{task_id}")),
        ("DELETE", format!("/tasks/admin/{task_id}")),
        ("PATCH", format!("/tasks/admin/{task_id}/status?status=completed")),
        ("PATCH", format!("/tasks/admin/{task_id}/priority?priority=low")),
        ("POST", format!("/tasks/admin/{task_id}/assign?username=ada")),
        ("POST", format!("/tasks/admin/{task_id}/comments")),
    ];

    for (method, uri) in attempts {
        let body = matches!(method, "POST" | "PUT").then(|| json!({ "text": "x", "title": "x", "author": "ada" }));
        let response = request(&test_app.app, method, &uri, Some(&user), body).await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{method} {uri}");
        let body = body_json(response).await?;
        assert_eq!(body["message"], "Admin role required");
    }

    Ok(())
}

#[tokio::test]
async fn admin_crud_flow() -> Result<()> {
    let test_app = spawn_app().await?;
    register(&test_app.app, "ada", "ada@example.com", "password123").await?;
    let admin = create_admin(&test_app, "root", "root@example.com", "password123").await?;

    // Create with explicit fields.
    let response = request(
        &test_app.app,
        "POST",
        "/tasks/admin",
        Some(&admin),
        Some(json!({
            "title": "Write the release notes",
            "description": "Cover the auth changes",
            "status": "pending",
            "priority": "high",
            "author": "ada",
            "assignees": []
        })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let task = body_json(response).await?;
    assert_eq!(task["title"], "Write the release notes");
    assert_eq!(task["status"], "PENDING");
    assert_eq!(task["priority"], "HIGH");
    assert_eq!(task["author"], "ada");
    let task_id = task["id"].as_i64().unwrap();

    // The listing shows it.
    let response = request(&test_app.app, "GET", "/tasks/admin", Some(&admin), None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let tasks = body_json(response).await?;
    assert_eq!(tasks.as_array().unwrap().len(), 1);

    // Partial update keeps the fields that were not sent.
    let response = request(
        &test_app.app,
        "PUT",
        &format!("/tasks/admin/{task_id}"),
        Some(&admin),
        Some(json!({ "description": "Cover the auth and task changes" })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let task = body_json(response).await?;
    assert_eq!(task["title"], "Write the release notes");
    assert_eq!(task["description"], "Cover the auth and task changes");

    // Status and priority via query parameters.
    let response = request(
        &test_app.app,
        "PATCH",
        &format!("/tasks/admin/{task_id}/status?status=in_progress"),
        Some(&admin),
        None,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let task = body_json(response).await?;
    assert_eq!(task["status"], "IN_PROGRESS");

    let response = request(
        &test_app.app,
        "PATCH",
        &format!("/tasks/admin/{task_id}/priority?priority=LOW"),
        Some(&admin),
        None,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let task = body_json(response).await?;
    assert_eq!(task["priority"], "LOW");

    // Delete, then the id is gone.
    let response = request(&test_app.app, "DELETE", &format!("/tasks/admin/{task_id}"), Some(&admin), None).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = request(&test_app.app, "DELETE", &format!("/tasks/admin/{task_id}"), Some(&admin), None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn invalid_enum_values_are_rejected() -> Result<()> {
    let test_app = spawn_app().await?;
    register(&test_app.app, "ada", "ada@example.com", "password123").await?;
    let admin = create_admin(&test_app, "root", "root@example.com", "password123").await?;
    let task_id = create_task(&test_app.app, &admin, "ada", &[]).await?;

    let response = request(
        &test_app.app,
        "PATCH",
        &format!("/tasks/admin/{task_id}/status?status=DONE"),
        Some(&admin),
        None,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["message"], "Invalid status value");

    let response = request(
        &test_app.app,
        "PATCH",
        &format!("/tasks/admin/{task_id}/priority?priority=URGENT"),
        Some(&admin),
        None,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["message"], "Invalid priority value");

    Ok(())
}

#[tokio::test]
async fn blank_title_is_rejected() -> Result<()> {
    let test_app = spawn_app().await?;
    register(&test_app.app, "ada", "ada@example.com", "password123").await?;
    let admin = create_admin(&test_app, "root", "root@example.com", "password123").await?;

    let response = request(
        &test_app.app,
        "POST",
        "/tasks/admin",
        Some(&admin),
        Some(json!({ "title": "   ", "author": "ada" })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["message"], "Title cannot be empty");

    Ok(())
}

#[tokio::test]
async fn unknown_author_fails_without_creating_a_task() -> Result<()> {
    let test_app = spawn_app().await?;
    let admin = create_admin(&test_app, "root", "root@example.com", "password123").await?;

    let response = request(
        &test_app.app,
        "POST",
        "/tasks/admin",
        Some(&admin),
        Some(json!({ "title": "Orphan", "author": "ghost" })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = request(&test_app.app, "GET", "/tasks/admin", Some(&admin), None).await?;
    let tasks = body_json(response).await?;
    assert_eq!(tasks.as_array().unwrap().len(), 0);

    Ok(())
}

#[tokio::test]
async fn unknown_assignee_fails_without_creating_a_task() -> Result<()> {
    let test_app = spawn_app().await?;
    register(&test_app.app, "ada", "ada@example.com", "password123").await?;
    let admin = create_admin(&test_app, "root", "root@example.com", "password123").await?;

    let response = request(
        &test_app.app,
        "POST",
        "/tasks/admin",
        Some(&admin),
        Some(json!({ "title": "Orphan", "author": "ada", "assignees": ["ghost"] })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The rejected create must leave no task row behind.
    let response = request(&test_app.app, "GET", "/tasks/admin", Some(&admin), None).await?;
    let tasks = body_json(response).await?;
    assert_eq!(tasks.as_array().unwrap().len(), 0);

    Ok(())
}

#[tokio::test]
async fn assignment_grants_access_and_is_idempotent() -> Result<()> {
    let test_app = spawn_app().await?;
    register(&test_app.app, "ada", "ada@example.com", "password123").await?;
    let bob = register(&test_app.app, "bob", "bob@example.com", "password123").await?;
    let admin = create_admin(&test_app, "root", "root@example.com", "password123").await?;
    let task_id = create_task(&test_app.app, &admin, "ada", &[]).await?;

    // Before assignment the task is off limits.
    let response = request(&test_app.app, "GET", &format!("/tasks/{task_id}"), Some(&bob), None).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = request(
        &test_app.app,
        "POST",
        &format!("/tasks/admin/{task_id}/assign?username=bob"),
        Some(&admin),
        None,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let task = body_json(response).await?;
    assert_eq!(task["assignees"], json!(["bob"]));

    // Assigning the same user again does not duplicate the entry.
    let response = request(
        &test_app.app,
        "POST",
        &format!("/tasks/admin/{task_id}/assign?username=bob"),
        Some(&admin),
        None,
    )
    .await?;
    let task = body_json(response).await?;
    assert_eq!(task["assignees"], json!(["bob"]));

    let response = request(&test_app.app, "GET", &format!("/tasks/{task_id}"), Some(&bob), None).await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn admin_comments_without_owning_the_task() -> Result<()> {
    let test_app = spawn_app().await?;
    register(&test_app.app, "ada", "ada@example.com", "password123").await?;
    let admin = create_admin(&test_app, "root", "root@example.com", "password123").await?;
    let task_id = create_task(&test_app.app, &admin, "ada", &[]).await?;

    // The admin is neither author nor assignee, yet the admin comment route
    // does not consult the ownership check.
    let response = request(
        &test_app.app,
        "POST",
        &format!("/tasks/admin/{task_id}/comments"),
        Some(&admin),
        Some(json!({ "text": "Please pick this up this week." })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let comment = body_json(response).await?;
    assert_eq!(comment["author"], "root");

    // But the self-service comment route still applies it.
    let response = request(
        &test_app.app,
        "POST",
        &format!("/tasks/{task_id}/comments"),
        Some(&admin),
        Some(json!({ "text": "Second comment." })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn comment_length_bounds_are_enforced() -> Result<()> {
    let test_app = spawn_app().await?;
    register(&test_app.app, "ada", "ada@example.com", "password123").await?;
    let admin = create_admin(&test_app, "root", "root@example.com", "password123").await?;
    let task_id = create_task(&test_app.app, &admin, "ada", &[]).await?;

    let response = request(
        &test_app.app,
        "POST",
        &format!("/tasks/admin/{task_id}/comments"),
        Some(&admin),
        Some(json!({ "text": "x" })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let long = "x".repeat(501);
    let response = request(
        &test_app.app,
        "POST",
        &format!("/tasks/admin/{task_id}/comments"),
        Some(&admin),
        Some(json!({ "text": long })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["message"], "Comment must be between 2 and 500 characters");

    // The bound counts characters, not bytes: 300 two-byte characters fit.
    let non_ascii = "é".repeat(300);
    let response = request(
        &test_app.app,
        "POST",
        &format!("/tasks/admin/{task_id}/comments"),
        Some(&admin),
        Some(json!({ "text": non_ascii })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn update_can_replace_the_assignee_set() -> Result<()> {
    let test_app = spawn_app().await?;
    register(&test_app.app, "ada", "ada@example.com", "password123").await?;
    register(&test_app.app, "bob", "bob@example.com", "password123").await?;
    register(&test_app.app, "eve", "eve@example.com", "password123").await?;
    let admin = create_admin(&test_app, "root", "root@example.com", "password123").await?;
    let task_id = create_task(&test_app.app, &admin, "ada", &["bob"]).await?;

    let response = request(
        &test_app.app,
        "PUT",
        &format!("/tasks/admin/{task_id}"),
        Some(&admin),
        Some(json!({ "assignees": ["eve"] })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let task = body_json(response).await?;
    assert_eq!(task["assignees"], json!(["eve"]));

    // An unknown name in the set fails the whole update: neither the field
    // changes sent alongside it nor the assignee replacement survive.
    let response = request(
        &test_app.app,
        "PUT",
        &format!("/tasks/admin/{task_id}"),
        Some(&admin),
        Some(json!({ "title": "Renamed", "assignees": ["ghost"] })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = request(&test_app.app, "GET", "/tasks/admin", Some(&admin), None).await?;
    let tasks = body_json(response).await?;
    assert_eq!(tasks[0]["title"], "Implement user auth");
    assert_eq!(tasks[0]["assignees"], json!(["eve"]));

    Ok(())
}
