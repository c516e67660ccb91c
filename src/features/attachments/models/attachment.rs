use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::error::{AppError, Result};

pub const ATTACHMENT_COLUMNS: &str = "id, storage_key, original_name, content_type, size_bytes, \
     checksum, uploaded_by_id, issue_id, comment_id, feedback_id, created_at";

/// Stored file metadata. `checksum` is the SHA-256 of the bytes as uploaded
/// and is never rewritten.
#[derive(Debug, Clone, FromRow)]
pub struct Attachment {
    pub id: Uuid,
    pub storage_key: String,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub checksum: String,
    pub uploaded_by_id: Uuid,
    pub issue_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub feedback_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// What an attachment hangs off. At most one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentTarget {
    Unlinked,
    Issue(Uuid),
    Comment(Uuid),
    Feedback(Uuid),
}

impl AttachmentTarget {
    pub fn from_ids(
        issue_id: Option<Uuid>,
        comment_id: Option<Uuid>,
        feedback_id: Option<Uuid>,
    ) -> Result<Self> {
        match (issue_id, comment_id, feedback_id) {
            (None, None, None) => Ok(Self::Unlinked),
            (Some(id), None, None) => Ok(Self::Issue(id)),
            (None, Some(id), None) => Ok(Self::Comment(id)),
            (None, None, Some(id)) => Ok(Self::Feedback(id)),
            _ => Err(AppError::Validation(
                "An attachment can be linked to only one of issue, comment or feedback"
                    .to_string(),
            )),
        }
    }

    /// Column values in `(issue_id, comment_id, feedback_id)` order
    pub fn columns(self) -> (Option<Uuid>, Option<Uuid>, Option<Uuid>) {
        match self {
            Self::Unlinked => (None, None, None),
            Self::Issue(id) => (Some(id), None, None),
            Self::Comment(id) => (None, Some(id), None),
            Self::Feedback(id) => (None, None, Some(id)),
        }
    }
}

impl Attachment {
    pub fn target(&self) -> AttachmentTarget {
        AttachmentTarget::from_ids(self.issue_id, self.comment_id, self.feedback_id)
            .unwrap_or(AttachmentTarget::Unlinked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_target() {
        let id = Uuid::new_v4();
        assert_eq!(
            AttachmentTarget::from_ids(None, Some(id), None).unwrap(),
            AttachmentTarget::Comment(id)
        );
        assert_eq!(
            AttachmentTarget::from_ids(None, None, None).unwrap(),
            AttachmentTarget::Unlinked
        );
        assert_eq!(
            AttachmentTarget::Feedback(id).columns(),
            (None, None, Some(id))
        );
    }

    #[test]
    fn test_multiple_targets_rejected() {
        let result = AttachmentTarget::from_ids(Some(Uuid::new_v4()), None, Some(Uuid::new_v4()));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
