use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::comments::dtos::{CreateCommentDto, UpdateCommentDto};
use crate::features::comments::models::{Comment, CommentVisibility, COMMENT_COLUMNS};
use crate::features::comments::services::mentions::extract_mentions;
use crate::features::issues::models::Issue;
use crate::features::issues::services::IssueScope;
use crate::features::issues::IssueService;
use crate::features::notifications::models::NotificationType;
use crate::features::notifications::NotificationService;
use crate::features::users::models::UserRole;
use crate::modules::storage::{self, BlobStore};
use crate::shared::types::PaginationQuery;

pub struct CommentService {
    pool: PgPool,
    issues: Arc<IssueService>,
    notifications: Arc<NotificationService>,
    store: Arc<dyn BlobStore>,
}

/// Mentioned users who can open the issue; the rest are not notified
pub fn visible_mentions(issue: &Issue, candidates: Vec<(Uuid, UserRole)>) -> Vec<Uuid> {
    candidates
        .into_iter()
        .filter(|(id, role)| IssueScope::for_role(*id, *role).allows(issue))
        .map(|(id, _)| id)
        .collect()
}

impl CommentService {
    pub fn new(
        pool: PgPool,
        issues: Arc<IssueService>,
        notifications: Arc<NotificationService>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            pool,
            issues,
            notifications,
            store,
        }
    }

    /// Comments on an issue in posting order; clients only see public ones
    pub async fn list(
        &self,
        actor: &AuthenticatedUser,
        issue_id: Uuid,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<Comment>, i64)> {
        let issue = self.issues.get(actor, issue_id).await?;
        let include_internal = actor.is_staff();
        let where_clause = "WHERE issue_id = $1 AND ($2 OR visibility = 'public')";

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM comments {where_clause}"))
                .bind(issue.id)
                .bind(include_internal)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to count comments: {:?}", e);
                    AppError::Database(e)
                })?;

        let query = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments {where_clause} \
             ORDER BY created_at, id LIMIT $3 OFFSET $4"
        );
        let comments = sqlx::query_as::<_, Comment>(&query)
            .bind(issue.id)
            .bind(include_internal)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list comments: {:?}", e);
                AppError::Database(e)
            })?;

        Ok((comments, total))
    }

    pub async fn create(
        &self,
        actor: &AuthenticatedUser,
        issue_id: Uuid,
        dto: CreateCommentDto,
    ) -> Result<Comment> {
        let visibility = dto.visibility.unwrap_or_default();
        if visibility == CommentVisibility::Internal && !actor.is_staff() {
            return Err(AppError::Forbidden(
                "Only staff can post internal comments".to_string(),
            ));
        }

        let issue = self.issues.get(actor, issue_id).await?;

        if let Some(parent_id) = dto.parent_id {
            self.ensure_parent(actor, &issue, parent_id).await?;
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            tracing::error!("Failed to start transaction: {:?}", e);
            AppError::Database(e)
        })?;

        let query = format!(
            r#"
            INSERT INTO comments (id, issue_id, author_id, parent_id, content, visibility)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {COMMENT_COLUMNS}
            "#
        );
        let comment = sqlx::query_as::<_, Comment>(&query)
            .bind(Uuid::now_v7())
            .bind(issue.id)
            .bind(actor.user_id)
            .bind(dto.parent_id)
            .bind(dto.content.trim())
            .bind(visibility)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert comment: {:?}", e);
                AppError::Database(e)
            })?;

        if !dto.attachment_ids.is_empty() {
            // Only the uploader's own, still unlinked attachments qualify
            let linked = sqlx::query(
                r#"
                UPDATE attachments SET comment_id = $1
                WHERE id = ANY($2)
                  AND uploaded_by_id = $3
                  AND issue_id IS NULL AND comment_id IS NULL AND feedback_id IS NULL
                "#,
            )
            .bind(comment.id)
            .bind(&dto.attachment_ids)
            .bind(actor.user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to link attachments: {:?}", e);
                AppError::Database(e)
            })?
            .rows_affected();

            let mut requested = dto.attachment_ids.clone();
            requested.sort();
            requested.dedup();
            if linked != requested.len() as u64 {
                return Err(AppError::Validation(
                    "Attachments must be your own and not linked elsewhere".to_string(),
                ));
            }
        }

        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit transaction: {:?}", e);
            AppError::Database(e)
        })?;

        tracing::info!("Comment {} added to issue {}", comment.id, issue.id);
        self.notify_created(actor, &issue, &comment).await;
        Ok(comment)
    }

    pub async fn update(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        dto: UpdateCommentDto,
    ) -> Result<Comment> {
        self.get_own(actor, id).await?;

        let query = format!(
            r#"
            UPDATE comments SET content = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {COMMENT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .bind(dto.content.trim())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update comment {}: {:?}", id, e);
                AppError::Database(e)
            })
    }

    /// Removes the comment, its replies and the files attached to any of them
    pub async fn delete(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<()> {
        self.get_own(actor, id).await?;

        let keys: Vec<String> = sqlx::query_scalar(
            r#"
            WITH RECURSIVE thread AS (
                SELECT id FROM comments WHERE id = $1
                UNION ALL
                SELECT c.id FROM comments c JOIN thread t ON c.parent_id = t.id
            )
            SELECT storage_key FROM attachments WHERE comment_id IN (SELECT id FROM thread)
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list attachments of comment {}: {:?}", id, e);
            AppError::Database(e)
        })?;

        sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete comment {}: {:?}", id, e);
                AppError::Database(e)
            })?;

        let removed = storage::delete_all(self.store.as_ref(), &keys).await;

        tracing::info!(
            "Comment {} deleted by {} ({}/{} files removed)",
            id,
            actor.user_id,
            removed,
            keys.len()
        );
        Ok(())
    }

    /// Only the author may change or remove a comment
    async fn get_own(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<Comment> {
        let query = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1");
        let comment = sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch comment {}: {:?}", id, e);
                AppError::Database(e)
            })?
            .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", id)))?;

        if comment.author_id != actor.user_id {
            return Err(AppError::Forbidden(
                "You can only modify your own comments".to_string(),
            ));
        }
        Ok(comment)
    }

    async fn ensure_parent(
        &self,
        actor: &AuthenticatedUser,
        issue: &Issue,
        parent_id: Uuid,
    ) -> Result<()> {
        let parent: Option<(Uuid, CommentVisibility)> =
            sqlx::query_as("SELECT issue_id, visibility FROM comments WHERE id = $1")
                .bind(parent_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to fetch parent comment: {:?}", e);
                    AppError::Database(e)
                })?;

        match parent {
            Some((parent_issue, visibility))
                if parent_issue == issue.id
                    && (actor.is_staff() || visibility == CommentVisibility::Public) =>
            {
                Ok(())
            }
            _ => Err(AppError::Validation(
                "Parent comment must belong to the same issue".to_string(),
            )),
        }
    }

    async fn notify_created(&self, actor: &AuthenticatedUser, issue: &Issue, comment: &Comment) {
        let handles = extract_mentions(&comment.content);
        let mut mentioned: Vec<Uuid> = Vec::new();

        if !handles.is_empty() {
            // Clients are never told about internal comments
            let result = sqlx::query_as::<_, (Uuid, UserRole)>(
                r#"
                SELECT id, role FROM users
                WHERE is_active = TRUE
                  AND id <> $2
                  AND (LOWER(email) = ANY($1) OR split_part(LOWER(email), '@', 1) = ANY($1))
                  AND ($3 = FALSE OR role <> 'client')
                "#,
            )
            .bind(&handles)
            .bind(actor.user_id)
            .bind(comment.visibility == CommentVisibility::Internal)
            .fetch_all(&self.pool)
            .await;

            match result {
                Ok(candidates) => mentioned = visible_mentions(issue, candidates),
                Err(e) => tracing::warn!("Failed to resolve mentions: {:?}", e),
            }

            self.notifications
                .notify_many(
                    &mentioned,
                    NotificationType::Mention,
                    &format!(
                        "{} mentioned you in a comment on issue \"{}\"",
                        actor.email, issue.title
                    ),
                    Some(issue.id),
                )
                .await;
        }

        if let Some(assignee_id) = issue
            .assignee_id
            .filter(|id| *id != actor.user_id && !mentioned.contains(id))
        {
            self.notifications
                .notify(
                    assignee_id,
                    NotificationType::NewComment,
                    &format!("New comment on issue \"{}\"", issue.title),
                    Some(issue.id),
                )
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::issues::models::{IssuePriority, IssueStatus};
    use chrono::Utc;

    fn issue(reporter_id: Uuid, assignee_id: Option<Uuid>) -> Issue {
        let now = Utc::now();
        Issue {
            id: Uuid::new_v4(),
            title: "Invoice totals are wrong".to_string(),
            description: "Rounding differs from the PDF".to_string(),
            status: IssueStatus::Open,
            priority: IssuePriority::Medium,
            reporter_id,
            assignee_id,
            created_by_id: reporter_id,
            due_date: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_mentions_skip_clients_outside_the_issue() {
        let reporter = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let issue = issue(reporter, None);

        let notified = visible_mentions(
            &issue,
            vec![(reporter, UserRole::Client), (stranger, UserRole::Client)],
        );
        assert_eq!(notified, vec![reporter]);
    }

    #[test]
    fn test_mentions_follow_staff_scope() {
        let assignee = Uuid::new_v4();
        let other_staff = Uuid::new_v4();
        let manager = Uuid::new_v4();
        let issue = issue(Uuid::new_v4(), Some(assignee));

        let notified = visible_mentions(
            &issue,
            vec![
                (assignee, UserRole::Staff),
                (other_staff, UserRole::Staff),
                (manager, UserRole::Manager),
            ],
        );
        assert_eq!(notified, vec![assignee, manager]);
    }
}
