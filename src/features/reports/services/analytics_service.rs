use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::reports::dtos::{
    FeedbackMetricsDto, IssueMetricsDto, MetricsDto, UserMetricsDto,
};
use crate::features::reports::models::ReportParameters;
use crate::features::reports::services::analytics::{
    AnalyticsReport, AnalyticsWindow, FeedbackFacts, IssueFacts, StaffMember,
};
use crate::features::reports::services::render::csv_line;

/// Roles listed in team performance
const TEAM_ROLES: [&str; 3] = ["staff", "manager", "admin"];

/// Reads the rows analytics are computed from
pub struct AnalyticsService {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ExportRow {
    id: Uuid,
    title: String,
    status: String,
    priority: String,
    reporter_email: String,
    assignee_email: Option<String>,
    due_date: Option<DateTime<Utc>>,
    resolved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl AnalyticsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn analytics(&self, params: &ReportParameters) -> Result<AnalyticsReport> {
        let now = Utc::now();
        let window = AnalyticsWindow::resolve(params, now.date_naive());
        if window.is_empty() {
            tracing::debug!(
                "Analytics window {} > {} selects nothing",
                window.start,
                window.end
            );
            return Ok(AnalyticsReport::empty(&window, now));
        }

        let issues = sqlx::query_as::<_, IssueFacts>(
            r#"
            SELECT
                i.status, i.priority, i.assignee_id, i.due_date, i.resolved_at, i.created_at,
                (
                    SELECT MIN(c.created_at) FROM comments c
                    WHERE c.issue_id = i.id AND c.author_id <> i.reporter_id
                ) AS first_response_at
            FROM issues i
            WHERE i.created_at >= $1 AND i.created_at < $2
              AND (cardinality($3::text[]) = 0 OR i.status::text = ANY($3))
              AND (cardinality($4::text[]) = 0 OR i.priority::text = ANY($4))
            "#,
        )
        .bind(window.starts_at())
        .bind(window.ends_before())
        .bind(window.status_filter())
        .bind(window.priority_filter())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load issues for analytics: {:?}", e);
            AppError::Database(e)
        })?;

        let staff = sqlx::query_as::<_, StaffMember>(
            r#"
            SELECT id, TRIM(first_name || ' ' || last_name) AS name, email
            FROM users
            WHERE is_active = TRUE AND role::text = ANY($1)
            ORDER BY first_name, last_name
            "#,
        )
        .bind(TEAM_ROLES.map(String::from).to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load staff for analytics: {:?}", e);
            AppError::Database(e)
        })?;

        let feedback = sqlx::query_as::<_, FeedbackFacts>(
            "SELECT status, created_at FROM feedback WHERE created_at >= $1 AND created_at < $2",
        )
        .bind(window.starts_at())
        .bind(window.ends_before())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load feedback for analytics: {:?}", e);
            AppError::Database(e)
        })?;

        Ok(AnalyticsReport::build(&window, &issues, &staff, &feedback, now))
    }

    /// Live counts across the whole system plus activity in the last 24 hours
    pub async fn metrics(&self) -> Result<MetricsDto> {
        let now = Utc::now();
        let since = now - Duration::hours(24);

        let issues: IssueMetricsDto = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'open') AS open,
                COUNT(*) FILTER (WHERE status = 'in_progress') AS in_progress,
                COUNT(*) FILTER (WHERE status IN ('open', 'in_progress', 'reopen')) AS unresolved,
                COUNT(*) FILTER (WHERE priority = 'high') AS high_priority,
                COUNT(*) FILTER (WHERE priority = 'critical') AS critical,
                COUNT(*) FILTER (WHERE created_at >= $1) AS recent_24h
            FROM issues
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to count issue metrics: {:?}", e);
            AppError::Database(e)
        })?;

        let feedback: FeedbackMetricsDto = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'new') AS pending,
                COUNT(*) FILTER (WHERE created_at >= $1) AS recent_24h
            FROM feedback
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to count feedback metrics: {:?}", e);
            AppError::Database(e)
        })?;

        let users: UserMetricsDto = sqlx::query_as(
            "SELECT COUNT(*) AS total, COUNT(*) FILTER (WHERE is_active) AS active FROM users",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to count user metrics: {:?}", e);
            AppError::Database(e)
        })?;

        Ok(MetricsDto {
            issues,
            feedback,
            users,
            updated_at: now,
            since,
        })
    }

    /// Issues in the window as CSV, newest first
    pub async fn export_issues(
        &self,
        params: &ReportParameters,
        assignee_id: Option<Uuid>,
    ) -> Result<String> {
        let window = AnalyticsWindow::resolve(params, Utc::now().date_naive());
        let mut out = csv_line(&[
            "ID",
            "Title",
            "Status",
            "Priority",
            "Reporter",
            "Assignee",
            "Created",
            "Due",
            "Resolved",
        ]);
        if window.is_empty() {
            return Ok(out);
        }

        let rows = sqlx::query_as::<_, ExportRow>(
            r#"
            SELECT
                i.id, i.title, i.status::text AS status, i.priority::text AS priority,
                r.email AS reporter_email, a.email AS assignee_email,
                i.due_date, i.resolved_at, i.created_at
            FROM issues i
            JOIN users r ON r.id = i.reporter_id
            LEFT JOIN users a ON a.id = i.assignee_id
            WHERE i.created_at >= $1 AND i.created_at < $2
              AND (cardinality($3::text[]) = 0 OR i.status::text = ANY($3))
              AND (cardinality($4::text[]) = 0 OR i.priority::text = ANY($4))
              AND ($5::uuid IS NULL OR i.assignee_id = $5)
            ORDER BY i.created_at DESC
            "#,
        )
        .bind(window.starts_at())
        .bind(window.ends_before())
        .bind(window.status_filter())
        .bind(window.priority_filter())
        .bind(assignee_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to export issues: {:?}", e);
            AppError::Database(e)
        })?;

        let timestamp = |t: Option<DateTime<Utc>>| {
            t.map(|t| t.to_rfc3339()).unwrap_or_default()
        };
        for row in rows {
            out.push_str(&csv_line(&[
                row.id.to_string(),
                row.title,
                row.status,
                row.priority,
                row.reporter_email,
                row.assignee_email.unwrap_or_default(),
                row.created_at.to_rfc3339(),
                timestamp(row.due_date),
                timestamp(row.resolved_at),
            ]));
        }
        Ok(out)
    }
}
