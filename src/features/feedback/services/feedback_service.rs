use std::sync::Arc;

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::feedback::dtos::{
    ConvertFeedbackDto, CreateFeedbackDto, FeedbackFilterQuery, UpdateFeedbackDto,
};
use crate::features::feedback::models::{Feedback, FeedbackStatus, FEEDBACK_COLUMNS};
use crate::features::feedback::services::rules;
use crate::features::issues::models::{Issue, NewIssue};
use crate::features::issues::IssueService;
use crate::features::notifications::models::NotificationType;
use crate::features::notifications::NotificationService;
use crate::features::users::models::UserRole;
use crate::features::users::UserService;
use crate::modules::storage::{self, BlobStore};
use crate::shared::types::PaginationQuery;

pub struct FeedbackService {
    pool: PgPool,
    users: Arc<UserService>,
    notifications: Arc<NotificationService>,
    store: Arc<dyn BlobStore>,
}

impl FeedbackService {
    pub fn new(
        pool: PgPool,
        users: Arc<UserService>,
        notifications: Arc<NotificationService>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            pool,
            users,
            notifications,
            store,
        }
    }

    /// Anonymous submissions are allowed; a signed-in submitter is recorded
    /// and their account email is used when none is given
    pub async fn create(
        &self,
        actor: Option<&AuthenticatedUser>,
        dto: CreateFeedbackDto,
    ) -> Result<Feedback> {
        let email = dto
            .email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .or_else(|| actor.map(|a| a.email.clone()));

        let query = format!(
            r#"
            INSERT INTO feedback (id, title, description, email, user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {FEEDBACK_COLUMNS}
            "#
        );
        let feedback = sqlx::query_as::<_, Feedback>(&query)
            .bind(Uuid::now_v7())
            .bind(dto.title.trim())
            .bind(dto.description.trim())
            .bind(email)
            .bind(actor.map(|a| a.user_id))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert feedback: {:?}", e);
                AppError::Database(e)
            })?;

        tracing::info!(
            "Feedback {} submitted ({})",
            feedback.id,
            if feedback.user_id.is_some() {
                "signed in"
            } else {
                "anonymous"
            }
        );
        Ok(feedback)
    }

    /// Feedback matching `filter`; `owner` restricts to one submitter
    pub async fn list(
        &self,
        filter: &FeedbackFilterQuery,
        owner: Option<Uuid>,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<Feedback>, i64)> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let where_clause = r#"
            WHERE ($1::feedback_status IS NULL OR status = $1)
              AND ($2::text IS NULL OR title ILIKE $2 OR description ILIKE $2 OR email ILIKE $2)
              AND ($3::uuid IS NULL OR user_id = $3)
        "#;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM feedback {where_clause}"))
                .bind(filter.status)
                .bind(search.as_deref())
                .bind(owner)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to count feedback: {:?}", e);
                    AppError::Database(e)
                })?;

        let query = format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback {where_clause} \
             ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        );
        let items = sqlx::query_as::<_, Feedback>(&query)
            .bind(filter.status)
            .bind(search.as_deref())
            .bind(owner)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list feedback: {:?}", e);
                AppError::Database(e)
            })?;

        Ok((items, total))
    }

    /// Feedback the caller may not see is reported as not found
    pub async fn get(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<Feedback> {
        let feedback = self.fetch(id).await?;
        if !rules::can_view(actor, &feedback) {
            return Err(AppError::NotFound(format!("Feedback {} not found", id)));
        }
        Ok(feedback)
    }

    pub async fn update(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        dto: UpdateFeedbackDto,
    ) -> Result<Feedback> {
        let feedback = self.get(actor, id).await?;
        rules::ensure_editable(actor, &feedback)?;

        let query = format!(
            r#"
            UPDATE feedback
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {FEEDBACK_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Feedback>(&query)
            .bind(id)
            .bind(dto.title.as_deref().map(str::trim))
            .bind(dto.description.as_deref().map(str::trim))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update feedback {}: {:?}", id, e);
                AppError::Database(e)
            })
    }

    pub async fn delete(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<()> {
        let storage_keys: Vec<String> =
            sqlx::query_scalar("SELECT storage_key FROM attachments WHERE feedback_id = $1")
                .bind(id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to load attachments of feedback {}: {:?}", id, e);
                    AppError::Database(e)
                })?;

        let result = sqlx::query("DELETE FROM feedback WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete feedback {}: {:?}", id, e);
                AppError::Database(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Feedback {} not found", id)));
        }

        storage::delete_all(self.store.as_ref(), &storage_keys).await;

        tracing::info!("Feedback {} deleted by {}", id, actor.user_id);
        Ok(())
    }

    pub async fn acknowledge(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<Feedback> {
        let feedback = self.fetch(id).await?;
        rules::ensure_acknowledgeable(&feedback)?;

        let updated = self
            .set_status(id, FeedbackStatus::Acknowledged, "status = 'new'")
            .await?;
        tracing::info!("Feedback {} acknowledged by {}", id, actor.user_id);

        let message = format!("Your feedback \"{}\" has been acknowledged", updated.title);
        self.notify_submitter(&updated, actor, NotificationType::FeedbackAcknowledged, &message, None)
            .await;
        Ok(updated)
    }

    pub async fn close(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<Feedback> {
        let feedback = self.fetch(id).await?;
        rules::ensure_closable(&feedback)?;

        let updated = self
            .set_status(id, FeedbackStatus::Closed, "status <> 'closed'")
            .await?;
        tracing::info!("Feedback {} closed by {}", id, actor.user_id);
        Ok(updated)
    }

    /// Create an issue from feedback and link them, atomically.
    ///
    /// Fails with a conflict, changing nothing, when the feedback was already
    /// converted.
    pub async fn convert(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        dto: ConvertFeedbackDto,
    ) -> Result<(Feedback, Issue)> {
        if let Some(assignee_id) = dto.assignee_id {
            match UserService::fetch_by_id(&self.pool, assignee_id).await? {
                Some(user) if user.is_active && user.role.is_staff() => {}
                _ => {
                    return Err(AppError::Validation(
                        "Assignee must be an active staff, manager or admin user".to_string(),
                    ))
                }
            }
        }

        let mut tx = self.begin().await?;

        let query = format!("SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE id = $1 FOR UPDATE");
        let feedback = sqlx::query_as::<_, Feedback>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to lock feedback {}: {:?}", id, e);
                AppError::Database(e)
            })?
            .ok_or_else(|| AppError::NotFound(format!("Feedback {} not found", id)))?;

        rules::ensure_convertible(&feedback)?;

        let (title, description) = rules::conversion_content(&feedback, &dto);
        let issue = IssueService::insert_with_history(
            &mut tx,
            &NewIssue {
                title,
                description,
                priority: dto.priority.unwrap_or_default(),
                reporter_id: feedback.user_id.unwrap_or(actor.user_id),
                assignee_id: dto.assignee_id,
                created_by_id: actor.user_id,
                due_date: dto.due_date,
            },
        )
        .await?;

        let query = format!(
            r#"
            UPDATE feedback
            SET status = 'converted', converted_to_issue_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {FEEDBACK_COLUMNS}
            "#
        );
        let converted = sqlx::query_as::<_, Feedback>(&query)
            .bind(id)
            .bind(issue.id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to mark feedback {} converted: {:?}", id, e);
                AppError::Database(e)
            })?;

        self.commit(tx).await?;
        tracing::info!(
            "Feedback {} converted to issue {} by {}",
            id,
            issue.id,
            actor.user_id
        );

        self.notify_converted(actor, &converted, &issue).await;
        Ok((converted, issue))
    }

    async fn notify_converted(&self, actor: &AuthenticatedUser, feedback: &Feedback, issue: &Issue) {
        let message = format!(
            "Your feedback \"{}\" has been converted to an issue",
            feedback.title
        );
        self.notify_submitter(
            feedback,
            actor,
            NotificationType::FeedbackConverted,
            &message,
            Some(issue.id),
        )
        .await;

        let staff: Vec<Uuid> = self
            .users
            .active_ids_with_roles(&[UserRole::Staff, UserRole::Admin])
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to load staff for notification: {}", e);
                Vec::new()
            })
            .into_iter()
            .filter(|id| *id != actor.user_id && Some(*id) != feedback.user_id)
            .collect();
        self.notifications
            .notify_many(
                &staff,
                NotificationType::FeedbackConverted,
                &format!(
                    "Feedback \"{}\" was converted to issue \"{}\" by {}",
                    feedback.title, issue.title, actor.email
                ),
                Some(issue.id),
            )
            .await;

        if let Some(assignee_id) = issue.assignee_id.filter(|id| *id != actor.user_id) {
            self.notifications
                .notify(
                    assignee_id,
                    NotificationType::Assignment,
                    &format!("You have been assigned to issue: \"{}\"", issue.title),
                    Some(issue.id),
                )
                .await;
        }
    }

    /// Signed-in submitters get an in-app notification, anonymous ones an
    /// email when they left an address
    async fn notify_submitter(
        &self,
        feedback: &Feedback,
        actor: &AuthenticatedUser,
        kind: NotificationType,
        message: &str,
        issue_id: Option<Uuid>,
    ) {
        match (feedback.user_id, feedback.email.as_deref()) {
            (Some(user_id), _) if user_id != actor.user_id => {
                self.notifications
                    .notify(user_id, kind, message, issue_id)
                    .await;
            }
            (None, Some(email)) => self.notifications.notify_email(email, kind, message),
            _ => {}
        }
    }

    async fn set_status(&self, id: Uuid, status: FeedbackStatus, guard: &str) -> Result<Feedback> {
        let query = format!(
            r#"
            UPDATE feedback SET status = $2, updated_at = NOW()
            WHERE id = $1 AND {guard}
            RETURNING {FEEDBACK_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Feedback>(&query)
            .bind(id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to set feedback {} status: {:?}", id, e);
                AppError::Database(e)
            })?
            .ok_or_else(|| {
                AppError::Conflict(format!("Feedback {} was changed concurrently", id))
            })
    }

    async fn fetch(&self, id: Uuid) -> Result<Feedback> {
        let query = format!("SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE id = $1");
        sqlx::query_as::<_, Feedback>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch feedback {}: {:?}", id, e);
                AppError::Database(e)
            })?
            .ok_or_else(|| AppError::NotFound(format!("Feedback {} not found", id)))
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|e| {
            tracing::error!("Failed to start transaction: {:?}", e);
            AppError::Database(e)
        })
    }

    async fn commit(&self, tx: Transaction<'static, Postgres>) -> Result<()> {
        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit transaction: {:?}", e);
            AppError::Database(e)
        })
    }
}
