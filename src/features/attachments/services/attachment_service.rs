use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::attachments::dtos::AttachmentFilterQuery;
use crate::features::attachments::models::{Attachment, AttachmentTarget, ATTACHMENT_COLUMNS};
use crate::features::attachments::services::file_rules;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::feedback::FeedbackService;
use crate::features::issues::IssueService;
use crate::modules::storage::{object_key, BlobStore};
use crate::shared::types::PaginationQuery;

/// A file read from a multipart upload
pub struct UploadedFile {
    pub file_name: String,
    pub data: Vec<u8>,
    pub target: AttachmentTarget,
}

pub struct AttachmentService {
    pool: PgPool,
    store: Arc<dyn BlobStore>,
    issues: Arc<IssueService>,
    feedback: Arc<FeedbackService>,
    prefix: String,
    max_size: usize,
}

impl AttachmentService {
    pub fn new(
        pool: PgPool,
        store: Arc<dyn BlobStore>,
        issues: Arc<IssueService>,
        feedback: Arc<FeedbackService>,
        prefix: String,
        max_size: usize,
    ) -> Self {
        Self {
            pool,
            store,
            issues,
            feedback,
            prefix,
            max_size,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Store the bytes, then record them. The checksum is computed here once
    /// and never recomputed for the row.
    pub async fn upload(&self, actor: &AuthenticatedUser, file: UploadedFile) -> Result<Attachment> {
        let kind = file_rules::validate_upload(&file.file_name, file.data.len(), self.max_size)?;
        self.ensure_target_access(actor, file.target).await?;

        let id = Uuid::now_v7();
        let storage_key = object_key(&self.prefix, id, kind.extension);
        let checksum = file_rules::sha256_hex(&file.data);
        let size_bytes = file.data.len() as i64;
        let original_name = file_rules::sanitize_file_name(&file.file_name);

        self.store
            .put(&storage_key, file.data, kind.content_type)
            .await?;

        let (issue_id, comment_id, feedback_id) = file.target.columns();
        let query = format!(
            r#"
            INSERT INTO attachments (
                id, storage_key, original_name, content_type, size_bytes, checksum,
                uploaded_by_id, issue_id, comment_id, feedback_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ATTACHMENT_COLUMNS}
            "#
        );
        let inserted = sqlx::query_as::<_, Attachment>(&query)
            .bind(id)
            .bind(&storage_key)
            .bind(&original_name)
            .bind(kind.content_type)
            .bind(size_bytes)
            .bind(&checksum)
            .bind(actor.user_id)
            .bind(issue_id)
            .bind(comment_id)
            .bind(feedback_id)
            .fetch_one(&self.pool)
            .await;

        match inserted {
            Ok(attachment) => {
                tracing::info!(
                    "Attachment {} uploaded by {} ({} bytes)",
                    attachment.id,
                    actor.user_id,
                    attachment.size_bytes
                );
                Ok(attachment)
            }
            Err(e) => {
                tracing::error!("Failed to record attachment {}: {:?}", id, e);
                if let Err(cleanup) = self.store.delete(&storage_key).await {
                    tracing::warn!("Failed to remove orphaned file {}: {}", storage_key, cleanup);
                }
                Err(AppError::Database(e))
            }
        }
    }

    /// Staff see every attachment; everyone else only their own uploads
    pub async fn list(
        &self,
        actor: &AuthenticatedUser,
        filter: &AttachmentFilterQuery,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<Attachment>, i64)> {
        let uploader = (!actor.is_staff()).then_some(actor.user_id);
        let where_clause = r#"
            WHERE ($1::uuid IS NULL OR uploaded_by_id = $1)
              AND ($2::uuid IS NULL OR issue_id = $2)
              AND ($3::uuid IS NULL OR comment_id = $3)
              AND ($4::uuid IS NULL OR feedback_id = $4)
        "#;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM attachments {where_clause}"))
                .bind(uploader)
                .bind(filter.issue_id)
                .bind(filter.comment_id)
                .bind(filter.feedback_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to count attachments: {:?}", e);
                    AppError::Database(e)
                })?;

        let query = format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments {where_clause} \
             ORDER BY created_at DESC LIMIT $5 OFFSET $6"
        );
        let items = sqlx::query_as::<_, Attachment>(&query)
            .bind(uploader)
            .bind(filter.issue_id)
            .bind(filter.comment_id)
            .bind(filter.feedback_id)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list attachments: {:?}", e);
                AppError::Database(e)
            })?;

        Ok((items, total))
    }

    pub async fn get(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<Attachment> {
        let query = format!("SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE id = $1");
        let attachment = sqlx::query_as::<_, Attachment>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to get attachment {}: {:?}", id, e);
                AppError::Database(e)
            })?
            .ok_or_else(|| AppError::NotFound(format!("Attachment {} not found", id)))?;

        ensure_owner_or_staff(actor, &attachment)?;
        Ok(attachment)
    }

    /// Move the attachment to another issue, comment or feedback. Stored
    /// bytes and checksum are left untouched.
    pub async fn link(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        target: AttachmentTarget,
    ) -> Result<Attachment> {
        let attachment = self.get(actor, id).await?;
        if attachment.target() == target {
            return Ok(attachment);
        }
        self.ensure_target_access(actor, target).await?;

        let (issue_id, comment_id, feedback_id) = target.columns();
        let query = format!(
            r#"
            UPDATE attachments
            SET issue_id = $2, comment_id = $3, feedback_id = $4
            WHERE id = $1
            RETURNING {ATTACHMENT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Attachment>(&query)
            .bind(id)
            .bind(issue_id)
            .bind(comment_id)
            .bind(feedback_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to relink attachment {}: {:?}", id, e);
                AppError::Database(e)
            })
    }

    pub async fn delete(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<()> {
        let attachment = self.get(actor, id).await?;

        sqlx::query("DELETE FROM attachments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete attachment {}: {:?}", id, e);
                AppError::Database(e)
            })?;

        if let Err(e) = self.store.delete(&attachment.storage_key).await {
            tracing::warn!(
                "Failed to delete stored file {}: {}",
                attachment.storage_key,
                e
            );
        }

        tracing::info!("Attachment {} deleted by {}", id, actor.user_id);
        Ok(())
    }

    /// Load the stored bytes, refusing to serve anything whose hash no
    /// longer matches the recorded checksum
    pub async fn download(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<(Attachment, Vec<u8>)> {
        let attachment = self.get(actor, id).await?;
        let data = self.store.get(&attachment.storage_key).await?;

        if file_rules::sha256_hex(&data) != attachment.checksum {
            tracing::error!("Checksum mismatch for attachment {}", attachment.id);
            return Err(AppError::Storage(
                "Stored file failed its integrity check".to_string(),
            ));
        }

        Ok((attachment, data))
    }

    async fn ensure_target_access(
        &self,
        actor: &AuthenticatedUser,
        target: AttachmentTarget,
    ) -> Result<()> {
        match target {
            AttachmentTarget::Unlinked => Ok(()),
            AttachmentTarget::Issue(issue_id) => self.issues.get(actor, issue_id).await.map(|_| ()),
            AttachmentTarget::Feedback(feedback_id) => {
                self.feedback.get(actor, feedback_id).await.map(|_| ())
            }
            AttachmentTarget::Comment(comment_id) => {
                let row: Option<(Uuid, Uuid)> =
                    sqlx::query_as("SELECT issue_id, author_id FROM comments WHERE id = $1")
                        .bind(comment_id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(|e| {
                            tracing::error!("Failed to load comment {}: {:?}", comment_id, e);
                            AppError::Database(e)
                        })?;
                let (issue_id, author_id) = row.ok_or_else(|| {
                    AppError::NotFound(format!("Comment {} not found", comment_id))
                })?;

                self.issues.get(actor, issue_id).await?;
                if author_id != actor.user_id && !actor.is_staff() {
                    return Err(AppError::Forbidden(
                        "You can only attach files to your own comments".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

fn ensure_owner_or_staff(actor: &AuthenticatedUser, attachment: &Attachment) -> Result<()> {
    if attachment.uploaded_by_id == actor.user_id || actor.is_staff() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have access to this attachment".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::users::models::UserRole;
    use crate::shared::test_helpers::test_user as user;
    use chrono::Utc;

    fn attachment(uploaded_by_id: Uuid) -> Attachment {
        Attachment {
            id: Uuid::new_v4(),
            storage_key: "attachments/2025/03/x.txt".to_string(),
            original_name: "x.txt".to_string(),
            content_type: "text/plain".to_string(),
            size_bytes: 3,
            checksum: file_rules::sha256_hex(b"abc"),
            uploaded_by_id,
            issue_id: None,
            comment_id: None,
            feedback_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_uploader_and_staff_have_access() {
        let client = user(UserRole::Client);
        assert!(ensure_owner_or_staff(&client, &attachment(client.user_id)).is_ok());
        assert!(ensure_owner_or_staff(&user(UserRole::Staff), &attachment(client.user_id)).is_ok());
        assert!(matches!(
            ensure_owner_or_staff(&user(UserRole::Client), &attachment(client.user_id)),
            Err(AppError::Forbidden(_))
        ));
    }
}
