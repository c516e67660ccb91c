use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::features::comments::models::{Comment, CommentVisibility};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommentResponseDto {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub visibility: CommentVisibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Comment> for CommentResponseDto {
    fn from(c: Comment) -> Self {
        Self {
            id: c.id,
            issue_id: c.issue_id,
            author_id: c.author_id,
            parent_id: c.parent_id,
            content: c.content,
            visibility: c.visibility,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCommentDto {
    #[validate(length(min = 1, max = 10000, message = "Content must be 1-10000 characters"))]
    pub content: String,

    /// Defaults to public; only staff may post internal comments
    pub visibility: Option<CommentVisibility>,

    /// Reply to another comment on the same issue
    pub parent_id: Option<Uuid>,

    /// Previously uploaded, unlinked attachments to attach to this comment
    #[serde(default)]
    #[validate(length(max = 10, message = "At most 10 attachments per comment"))]
    pub attachment_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCommentDto {
    #[validate(length(min = 1, max = 10000, message = "Content must be 1-10000 characters"))]
    pub content: String,
}
