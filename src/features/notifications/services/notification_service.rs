use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::notifications::models::{
    Notification, NotificationType, NOTIFICATION_COLUMNS,
};
use crate::features::users::UserService;
use crate::modules::email::{render_notification_email, EmailQueue};
use crate::shared::types::PaginationQuery;

pub struct NotificationService {
    pool: PgPool,
    emails: EmailQueue,
    frontend_url: String,
}

impl NotificationService {
    pub fn new(pool: PgPool, emails: EmailQueue, frontend_url: String) -> Self {
        Self {
            pool,
            emails,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    /// Persist a notification and queue its email.
    ///
    /// Never fails: problems are logged at warn so the triggering operation
    /// is unaffected.
    pub async fn notify(
        &self,
        recipient_id: Uuid,
        kind: NotificationType,
        message: &str,
        issue_id: Option<Uuid>,
    ) {
        if let Err(e) = self.dispatch(recipient_id, kind, message, issue_id).await {
            tracing::warn!(
                "Failed to notify user {} ({:?}): {}",
                recipient_id,
                kind,
                e
            );
        }
    }

    /// Notify each distinct recipient once
    pub async fn notify_many(
        &self,
        recipients: &[Uuid],
        kind: NotificationType,
        message: &str,
        issue_id: Option<Uuid>,
    ) {
        let mut seen = Vec::with_capacity(recipients.len());
        for &recipient_id in recipients {
            if seen.contains(&recipient_id) {
                continue;
            }
            seen.push(recipient_id);
            self.notify(recipient_id, kind, message, issue_id).await;
        }
    }

    /// Email someone without an account, e.g. an anonymous feedback submitter
    pub fn notify_email(&self, to: &str, kind: NotificationType, message: &str) {
        if to.trim().is_empty() {
            return;
        }
        self.emails.enqueue(render_notification_email(
            to.trim(),
            "there",
            kind.title(),
            message,
            None,
        ));
    }

    async fn dispatch(
        &self,
        recipient_id: Uuid,
        kind: NotificationType,
        message: &str,
        issue_id: Option<Uuid>,
    ) -> Result<()> {
        let Some(recipient) = UserService::fetch_by_id(&self.pool, recipient_id).await? else {
            tracing::warn!("Notification recipient {} not found, skipping", recipient_id);
            return Ok(());
        };

        sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient_id, notification_type, message, issue_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(recipient_id)
        .bind(kind)
        .bind(message)
        .bind(issue_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert notification: {:?}", e);
            AppError::Database(e)
        })?;

        if recipient.email.trim().is_empty() || !recipient.is_active {
            tracing::debug!("User {} has no reachable email, skipping", recipient_id);
            return Ok(());
        }

        let link = issue_id.map(|id| format!("{}/issues/{}", self.frontend_url, id));
        self.emails.enqueue(render_notification_email(
            &recipient.email,
            &recipient.full_name(),
            kind.title(),
            message,
            link.as_deref(),
        ));
        Ok(())
    }

    pub async fn list_for_user(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<Notification>, i64)> {
        let where_clause = "WHERE recipient_id = $1 AND ($2 = FALSE OR is_read = FALSE)";

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM notifications {where_clause}"
        ))
        .bind(recipient_id)
        .bind(unread_only)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to count notifications: {:?}", e);
            AppError::Database(e)
        })?;

        let query = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications {where_clause} \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        );
        let items = sqlx::query_as::<_, Notification>(&query)
            .bind(recipient_id)
            .bind(unread_only)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list notifications: {:?}", e);
                AppError::Database(e)
            })?;

        Ok((items, total))
    }

    pub async fn unread_count(&self, recipient_id: Uuid) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to count unread notifications: {:?}", e);
            AppError::Database(e)
        })
    }

    /// Idempotent. Someone else's notification is reported as not found.
    pub async fn mark_read(&self, recipient_id: Uuid, id: Uuid) -> Result<Notification> {
        let query = format!(
            r#"
            UPDATE notifications SET is_read = TRUE
            WHERE id = $1 AND recipient_id = $2
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(id)
            .bind(recipient_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to mark notification {} read: {:?}", id, e);
                AppError::Database(e)
            })?
            .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))
    }

    pub async fn mark_all_read(&self, recipient_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to mark notifications read: {:?}", e);
            AppError::Database(e)
        })?;
        Ok(result.rows_affected())
    }

    pub async fn delete(&self, recipient_id: Uuid, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
            .bind(id)
            .bind(recipient_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete notification {}: {:?}", id, e);
                AppError::Database(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::email::LogMailer;
    use crate::shared::test_helpers::lazy_pool;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_notify_swallows_database_errors() {
        let (emails, _handle) = EmailQueue::start(Arc::new(LogMailer), 4);
        let service = NotificationService::new(lazy_pool(), emails, "http://localhost:3000/".into());
        assert_eq!(service.frontend_url, "http://localhost:3000");

        // The pool points at a closed port; notify must still return normally
        service
            .notify_many(
                &[Uuid::new_v4(), Uuid::new_v4()],
                NotificationType::NewIssue,
                "New issue",
                None,
            )
            .await;
    }
}
