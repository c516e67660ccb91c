use std::sync::Arc;

use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::reports::dtos::{CreateReportDto, MetricsDto, ReportFilterQuery};
use crate::features::reports::models::{Report, ReportParameters, REPORT_COLUMNS};
use crate::features::reports::services::analytics::AnalyticsReport;
use crate::features::reports::services::AnalyticsService;
use crate::modules::storage::BlobStore;
use crate::shared::types::PaginationQuery;

/// Report records and their stored files. Generation itself happens in
/// [`crate::features::reports::workers::ReportWorker`].
pub struct ReportService {
    pool: PgPool,
    store: Arc<dyn BlobStore>,
    analytics: Arc<AnalyticsService>,
}

impl ReportService {
    pub fn new(pool: PgPool, store: Arc<dyn BlobStore>, analytics: Arc<AnalyticsService>) -> Self {
        Self {
            pool,
            store,
            analytics,
        }
    }

    pub async fn analytics(&self, params: &ReportParameters) -> Result<AnalyticsReport> {
        self.analytics.analytics(params).await
    }

    pub async fn metrics(&self) -> Result<MetricsDto> {
        self.analytics.metrics().await
    }

    pub async fn export(&self, params: &ReportParameters, assignee_id: Option<Uuid>) -> Result<String> {
        self.analytics.export_issues(params, assignee_id).await
    }

    /// Queue a report; it is picked up by the worker on its next poll
    pub async fn create(&self, actor: &AuthenticatedUser, dto: CreateReportDto) -> Result<Report> {
        dto.parameters.validate_range()?;

        let name = dto
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .unwrap_or_else(|| {
                format!(
                    "{} {}",
                    dto.report_type.label(),
                    Utc::now().format("%Y-%m-%d")
                )
            });

        let query = format!(
            r#"
            INSERT INTO reports (id, name, report_type, format, requested_by_id, parameters)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {REPORT_COLUMNS}
            "#
        );
        let report = sqlx::query_as::<_, Report>(&query)
            .bind(Uuid::now_v7())
            .bind(&name)
            .bind(dto.report_type)
            .bind(dto.format)
            .bind(actor.user_id)
            .bind(Json(&dto.parameters))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create report: {:?}", e);
                AppError::Database(e)
            })?;

        tracing::info!(
            "Report {} ({}, {}) queued by {}",
            report.id,
            report.report_type.as_str(),
            report.format.extension(),
            actor.user_id
        );
        Ok(report)
    }

    /// Own reports; managers and admins see everyone's
    pub async fn list(
        &self,
        actor: &AuthenticatedUser,
        filter: &ReportFilterQuery,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<Report>, i64)> {
        let owner = (!actor.is_manager()).then_some(actor.user_id);
        let where_clause = r#"
            WHERE ($1::uuid IS NULL OR requested_by_id = $1)
              AND ($2::report_status IS NULL OR status = $2)
              AND ($3::report_type IS NULL OR report_type = $3)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM reports {where_clause}"))
            .bind(owner)
            .bind(filter.status)
            .bind(filter.report_type)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to count reports: {:?}", e);
                AppError::Database(e)
            })?;

        let query = format!(
            "SELECT {REPORT_COLUMNS} FROM reports {where_clause} \
             ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        );
        let items = sqlx::query_as::<_, Report>(&query)
            .bind(owner)
            .bind(filter.status)
            .bind(filter.report_type)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list reports: {:?}", e);
                AppError::Database(e)
            })?;

        Ok((items, total))
    }

    /// Someone else's report is reported as not found unless the caller is a
    /// manager
    pub async fn get(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<Report> {
        let query = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1");
        sqlx::query_as::<_, Report>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to get report {}: {:?}", id, e);
                AppError::Database(e)
            })?
            .filter(|report| report.requested_by_id == actor.user_id || actor.is_manager())
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))
    }

    pub async fn download(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<(Report, Vec<u8>)> {
        let report = self.get(actor, id).await?;
        let Some(file_key) = report.file_key.as_deref().filter(|_| report.is_downloadable()) else {
            return Err(AppError::Conflict(format!(
                "Report is not ready for download (status: {})",
                report.status
            )));
        };

        let data = self.store.get(file_key).await?;
        Ok((report, data))
    }

    /// Delete the record, then its stored file
    pub async fn delete(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<()> {
        let report = self.get(actor, id).await?;

        sqlx::query("DELETE FROM reports WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete report {}: {:?}", id, e);
                AppError::Database(e)
            })?;

        if let Some(key) = report.file_key.as_deref() {
            if let Err(e) = self.store.delete(key).await {
                tracing::warn!("Failed to delete report file {}: {}", key, e);
            }
        }

        tracing::info!("Report {} deleted by {}", id, actor.user_id);
        Ok(())
    }
}
