use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Comment joined with its author's username.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Comment {
    pub id: Uuid,
    #[schema(example = "Need help with this task.")]
    pub text: String,
    #[schema(example = "bob")]
    pub author: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CommentCreateRequest {
    #[schema(example = "Need help with this task.")]
    pub text: String,
}
