use std::sync::Arc;

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::issues::dtos::{CreateIssueDto, IssueFilterQuery, UpdateIssueDto};
use crate::features::issues::models::{
    Issue, IssueHistory, IssueStatus, NewIssue, ISSUE_COLUMNS, ISSUE_HISTORY_COLUMNS,
};
use crate::features::issues::services::transition::{
    plan_transition, transition_notifications, HistoryEntry,
};
use crate::features::notifications::models::NotificationType;
use crate::features::notifications::NotificationService;
use crate::features::users::models::{User, UserRole};
use crate::features::users::UserService;
use crate::modules::storage::{self, BlobStore};
use crate::shared::types::PaginationQuery;

/// Which issues a caller may see.
///
/// Clients see what they reported, staff additionally what is assigned to
/// them, managers and admins everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueScope {
    pub user_id: Option<Uuid>,
    pub include_assigned: bool,
}

impl IssueScope {
    pub fn for_user(user: &AuthenticatedUser) -> Self {
        Self::for_role(user.user_id, user.role)
    }

    pub fn for_role(user_id: Uuid, role: UserRole) -> Self {
        match role {
            UserRole::Client => Self {
                user_id: Some(user_id),
                include_assigned: false,
            },
            UserRole::Staff => Self {
                user_id: Some(user_id),
                include_assigned: true,
            },
            UserRole::Manager | UserRole::Admin => Self {
                user_id: None,
                include_assigned: false,
            },
        }
    }

    /// In-memory counterpart of the SQL scope clause
    pub fn allows(&self, issue: &Issue) -> bool {
        match self.user_id {
            None => true,
            Some(id) => {
                issue.reporter_id == id || (self.include_assigned && issue.assignee_id == Some(id))
            }
        }
    }
}

/// Binds as $1 (user id) and $2 (include assigned)
const SCOPE_CLAUSE: &str =
    "($1::uuid IS NULL OR reporter_id = $1 OR ($2::boolean AND assignee_id = $1))";

pub struct IssueService {
    pool: PgPool,
    users: Arc<UserService>,
    notifications: Arc<NotificationService>,
    store: Arc<dyn BlobStore>,
}

impl IssueService {
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

    pub async fn create(&self, actor: &AuthenticatedUser, dto: CreateIssueDto) -> Result<Issue> {
        let (reporter_id, assignee_id) = if actor.is_staff() {
            if let Some(reporter_id) = dto.reporter_id {
                self.ensure_active_user(reporter_id, "Reporter").await?;
            }
            if let Some(assignee_id) = dto.assignee_id {
                self.ensure_assignable(assignee_id).await?;
            }
            (dto.reporter_id.unwrap_or(actor.user_id), dto.assignee_id)
        } else {
            (actor.user_id, None)
        };

        let new_issue = NewIssue {
            title: dto.title.trim().to_string(),
            description: dto.description.trim().to_string(),
            priority: dto.priority.unwrap_or_default(),
            reporter_id,
            assignee_id,
            created_by_id: actor.user_id,
            due_date: dto.due_date,
        };

        let mut tx = self.begin().await?;
        let issue = Self::insert_with_history(&mut tx, &new_issue).await?;
        self.commit(tx).await?;

        tracing::info!("Issue {} created by {}", issue.id, actor.user_id);
        self.notify_created(&issue, actor).await;
        Ok(issue)
    }

    /// Insert an issue in `open` state together with its creation history row
    pub async fn insert_with_history(
        tx: &mut Transaction<'_, Postgres>,
        new_issue: &NewIssue,
    ) -> Result<Issue> {
        let query = format!(
            r#"
            INSERT INTO issues (id, title, description, status, priority, reporter_id,
                                assignee_id, created_by_id, due_date)
            VALUES ($1, $2, $3, 'open', $4, $5, $6, $7, $8)
            RETURNING {ISSUE_COLUMNS}
            "#
        );
        let issue = sqlx::query_as::<_, Issue>(&query)
            .bind(Uuid::now_v7())
            .bind(&new_issue.title)
            .bind(&new_issue.description)
            .bind(new_issue.priority)
            .bind(new_issue.reporter_id)
            .bind(new_issue.assignee_id)
            .bind(new_issue.created_by_id)
            .bind(new_issue.due_date)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert issue: {:?}", e);
                AppError::Database(e)
            })?;

        Self::record_history(
            tx,
            issue.id,
            &HistoryEntry {
                old_status: None,
                new_status: IssueStatus::Open,
                changed_by_id: Some(new_issue.created_by_id),
            },
        )
        .await?;

        Ok(issue)
    }

    pub async fn list(
        &self,
        actor: &AuthenticatedUser,
        filter: &IssueFilterQuery,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<Issue>, i64)> {
        let scope = IssueScope::for_user(actor);
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let where_clause = format!(
            r#"
            WHERE {SCOPE_CLAUSE}
              AND ($3::issue_status IS NULL OR status = $3)
              AND ($4::issue_priority IS NULL OR priority = $4)
              AND ($5::uuid IS NULL OR assignee_id = $5)
              AND ($6::uuid IS NULL OR reporter_id = $6)
              AND ($7::text IS NULL OR title ILIKE $7 OR description ILIKE $7)
            "#
        );

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM issues {where_clause}"))
            .bind(scope.user_id)
            .bind(scope.include_assigned)
            .bind(filter.status)
            .bind(filter.priority)
            .bind(filter.assignee_id)
            .bind(filter.reporter_id)
            .bind(search.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to count issues: {:?}", e);
                AppError::Database(e)
            })?;

        let query = format!(
            "SELECT {ISSUE_COLUMNS} FROM issues {where_clause} \
             ORDER BY created_at DESC LIMIT $8 OFFSET $9"
        );
        let issues = sqlx::query_as::<_, Issue>(&query)
            .bind(scope.user_id)
            .bind(scope.include_assigned)
            .bind(filter.status)
            .bind(filter.priority)
            .bind(filter.assignee_id)
            .bind(filter.reporter_id)
            .bind(search.as_deref())
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list issues: {:?}", e);
                AppError::Database(e)
            })?;

        Ok((issues, total))
    }

    /// Issues outside the caller's scope are reported as not found
    pub async fn get(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<Issue> {
        let scope = IssueScope::for_user(actor);
        let query = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE {SCOPE_CLAUSE} AND id = $3");
        sqlx::query_as::<_, Issue>(&query)
            .bind(scope.user_id)
            .bind(scope.include_assigned)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch issue {}: {:?}", id, e);
                AppError::Database(e)
            })?
            .ok_or_else(|| AppError::NotFound(format!("Issue {} not found", id)))
    }

    pub async fn history(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<Vec<IssueHistory>> {
        let issue = self.get(actor, id).await?;
        let query = format!(
            "SELECT {ISSUE_HISTORY_COLUMNS} FROM issue_history WHERE issue_id = $1 \
             ORDER BY changed_at, id"
        );
        sqlx::query_as::<_, IssueHistory>(&query)
            .bind(issue.id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to load history for issue {}: {:?}", id, e);
                AppError::Database(e)
            })
    }

    pub async fn update(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        dto: UpdateIssueDto,
    ) -> Result<Issue> {
        let issue = self.get(actor, id).await?;
        let query = format!(
            r#"
            UPDATE issues
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                priority = COALESCE($4, priority),
                due_date = CASE WHEN $6 THEN $5 ELSE due_date END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ISSUE_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, Issue>(&query)
            .bind(issue.id)
            .bind(dto.title.as_deref().map(str::trim))
            .bind(dto.description.as_deref().map(str::trim))
            .bind(dto.priority)
            .bind(dto.due_date.flatten())
            .bind(dto.due_date.is_some())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update issue {}: {:?}", id, e);
                AppError::Database(e)
            })?;

        tracing::info!("Issue {} updated by {}", id, actor.user_id);
        Ok(updated)
    }

    /// Delete an issue and the stored files of its attachments
    pub async fn delete(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<()> {
        let storage_keys: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT storage_key FROM attachments
            WHERE issue_id = $1
               OR comment_id IN (SELECT id FROM comments WHERE issue_id = $1)
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load attachments of issue {}: {:?}", id, e);
            AppError::Database(e)
        })?;

        let result = sqlx::query("DELETE FROM issues WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete issue {}: {:?}", id, e);
                AppError::Database(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Issue {} not found", id)));
        }

        storage::delete_all(self.store.as_ref(), &storage_keys).await;

        tracing::info!("Issue {} deleted by {}", id, actor.user_id);
        Ok(())
    }

    pub async fn assign(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        assignee_id: Uuid,
    ) -> Result<Issue> {
        let issue = self.get(actor, id).await?;
        let assignee = self.ensure_assignable(assignee_id).await?;

        if issue.assignee_id == Some(assignee_id) {
            return Ok(issue);
        }

        let query = format!(
            r#"
            UPDATE issues SET assignee_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ISSUE_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, Issue>(&query)
            .bind(issue.id)
            .bind(assignee_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to assign issue {}: {:?}", id, e);
                AppError::Database(e)
            })?;

        tracing::info!(
            "Issue {} assigned to {} by {}",
            id,
            assignee_id,
            actor.user_id
        );

        self.notifications
            .notify(
                assignee_id,
                NotificationType::Assignment,
                &format!("You have been assigned to issue: \"{}\"", updated.title),
                Some(updated.id),
            )
            .await;
        if updated.reporter_id != assignee_id {
            self.notifications
                .notify(
                    updated.reporter_id,
                    NotificationType::Assignment,
                    &format!(
                        "Your issue \"{}\" has been assigned to {}",
                        updated.title, assignee.email
                    ),
                    Some(updated.id),
                )
                .await;
        }

        Ok(updated)
    }

    /// Move an issue to `target`. Returns the issue and whether anything changed.
    pub async fn transition(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        target: IssueStatus,
    ) -> Result<(Issue, bool)> {
        let scope = IssueScope::for_user(actor);
        let mut tx = self.begin().await?;

        let query = format!(
            "SELECT {ISSUE_COLUMNS} FROM issues WHERE {SCOPE_CLAUSE} AND id = $3 FOR UPDATE"
        );
        let issue = sqlx::query_as::<_, Issue>(&query)
            .bind(scope.user_id)
            .bind(scope.include_assigned)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to lock issue {}: {:?}", id, e);
                AppError::Database(e)
            })?
            .ok_or_else(|| AppError::NotFound(format!("Issue {} not found", id)))?;

        let Some(plan) = plan_transition(&issue, target, actor.user_id, Utc::now()) else {
            tracing::debug!("Issue {} already {}, nothing to do", id, target);
            return Ok((issue, false));
        };

        let query = format!(
            r#"
            UPDATE issues SET status = $2, resolved_at = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {ISSUE_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, Issue>(&query)
            .bind(issue.id)
            .bind(plan.new_status)
            .bind(plan.resolved_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update status of issue {}: {:?}", id, e);
                AppError::Database(e)
            })?;

        Self::record_history(&mut tx, issue.id, &plan.history).await?;
        self.commit(tx).await?;

        tracing::info!(
            "Issue {} moved from {} to {} by {}",
            id,
            issue.status,
            plan.new_status,
            actor.user_id
        );

        let managers = if plan.new_status.is_terminal() {
            self.managers().await
        } else {
            Vec::new()
        };
        for planned in
            transition_notifications(&updated, &plan, actor.user_id, &actor.email, &managers)
        {
            self.notifications
                .notify(
                    planned.recipient_id,
                    planned.kind,
                    &planned.message,
                    Some(updated.id),
                )
                .await;
        }

        Ok((updated, true))
    }

    async fn record_history(
        tx: &mut Transaction<'_, Postgres>,
        issue_id: Uuid,
        entry: &HistoryEntry,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO issue_history (id, issue_id, changed_by_id, old_status, new_status)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(issue_id)
        .bind(entry.changed_by_id)
        .bind(entry.old_status)
        .bind(entry.new_status)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to record history for issue {}: {:?}", issue_id, e);
            AppError::Database(e)
        })?;
        Ok(())
    }

    async fn notify_created(&self, issue: &Issue, actor: &AuthenticatedUser) {
        let managers: Vec<Uuid> = self
            .managers()
            .await
            .into_iter()
            .filter(|id| *id != actor.user_id)
            .collect();
        self.notifications
            .notify_many(
                &managers,
                NotificationType::NewIssue,
                &format!("New issue created: \"{}\" by {}", issue.title, actor.email),
                Some(issue.id),
            )
            .await;

        if issue.reporter_id != actor.user_id {
            self.notifications
                .notify(
                    issue.reporter_id,
                    NotificationType::NewIssue,
                    &format!(
                        "Issue \"{}\" was reported on your behalf by {}",
                        issue.title, actor.email
                    ),
                    Some(issue.id),
                )
                .await;
        }

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

    /// Active managers and admins; empty on lookup failure
    async fn managers(&self) -> Vec<Uuid> {
        self.users
            .active_ids_with_roles(&[UserRole::Manager, UserRole::Admin])
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to load managers for notification: {}", e);
                Vec::new()
            })
    }

    async fn ensure_active_user(&self, id: Uuid, label: &str) -> Result<()> {
        match UserService::fetch_by_id(&self.pool, id).await? {
            Some(user) if user.is_active => Ok(()),
            _ => Err(AppError::Validation(format!(
                "{} must be an active user",
                label
            ))),
        }
    }

    async fn ensure_assignable(&self, id: Uuid) -> Result<User> {
        match UserService::fetch_by_id(&self.pool, id).await? {
            Some(user) if user.is_active && user.role.is_staff() => Ok(user),
            _ => Err(AppError::Validation(
                "Assignee must be an active staff, manager or admin user".to_string(),
            )),
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::issues::models::IssuePriority;
    use crate::shared::test_helpers::test_user;

    #[test]
    fn test_scope_per_role() {
        let client = test_user(UserRole::Client);
        assert_eq!(
            IssueScope::for_user(&client),
            IssueScope {
                user_id: Some(client.user_id),
                include_assigned: false
            }
        );

        let staff = test_user(UserRole::Staff);
        assert!(IssueScope::for_user(&staff).include_assigned);

        for role in [UserRole::Manager, UserRole::Admin] {
            assert_eq!(IssueScope::for_user(&test_user(role)).user_id, None);
        }
    }

    #[test]
    fn test_scope_allows_matches_visibility() {
        let reporter = Uuid::new_v4();
        let assignee = Uuid::new_v4();
        let other = Uuid::new_v4();
        let now = Utc::now();
        let issue = Issue {
            id: Uuid::new_v4(),
            title: "Checkout fails".to_string(),
            description: "500 on submit".to_string(),
            status: IssueStatus::Open,
            priority: IssuePriority::High,
            reporter_id: reporter,
            assignee_id: Some(assignee),
            created_by_id: reporter,
            due_date: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        };

        assert!(IssueScope::for_role(reporter, UserRole::Client).allows(&issue));
        assert!(!IssueScope::for_role(other, UserRole::Client).allows(&issue));
        // A client never sees an issue through assignment
        assert!(!IssueScope::for_role(assignee, UserRole::Client).allows(&issue));
        assert!(IssueScope::for_role(assignee, UserRole::Staff).allows(&issue));
        assert!(!IssueScope::for_role(other, UserRole::Staff).allows(&issue));
        assert!(IssueScope::for_role(other, UserRole::Manager).allows(&issue));
        assert!(IssueScope::for_role(other, UserRole::Admin).allows(&issue));
    }

    #[test]
    fn test_default_priority_for_new_issues() {
        let dto: CreateIssueDto =
            serde_json::from_str(r#"{"title":"t","description":"d"}"#).unwrap();
        assert_eq!(dto.priority.unwrap_or_default(), IssuePriority::Medium);
    }
}
