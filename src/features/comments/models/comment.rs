use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

/// Internal comments are only visible to staff, managers and admins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "comment_visibility", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CommentVisibility {
    #[default]
    Public,
    Internal,
}

pub const COMMENT_COLUMNS: &str =
    "id, issue_id, author_id, parent_id, content, visibility, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub visibility: CommentVisibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
