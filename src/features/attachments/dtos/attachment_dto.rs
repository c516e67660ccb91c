use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::features::attachments::models::Attachment;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttachmentResponseDto {
    pub id: Uuid,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    /// SHA-256 of the uploaded bytes, hex encoded
    pub checksum: String,
    pub uploaded_by_id: Uuid,
    pub issue_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub feedback_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<Attachment> for AttachmentResponseDto {
    fn from(a: Attachment) -> Self {
        Self {
            id: a.id,
            original_name: a.original_name,
            content_type: a.content_type,
            size_bytes: a.size_bytes,
            checksum: a.checksum,
            uploaded_by_id: a.uploaded_by_id,
            issue_id: a.issue_id,
            comment_id: a.comment_id,
            feedback_id: a.feedback_id,
            created_at: a.created_at,
        }
    }
}

/// Multipart form for attachment upload (used for OpenAPI documentation only)
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadAttachmentDto {
    /// pdf, jpg, jpeg, png, doc, docx or txt; at most 10 MiB
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,

    /// Link to an issue
    pub issue_id: Option<Uuid>,

    /// Link to one of your own comments
    pub comment_id: Option<Uuid>,

    /// Link to a feedback entry
    pub feedback_id: Option<Uuid>,
}

/// Replaces the attachment's link. All fields empty unlinks it.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct LinkAttachmentDto {
    pub issue_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub feedback_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttachmentFilterQuery {
    pub issue_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub feedback_id: Option<Uuid>,
}
