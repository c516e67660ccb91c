use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::issues::models::{IssuePriority, IssueStatus};
use crate::shared::constants::{MAX_ANALYTICS_YEAR, MIN_ANALYTICS_YEAR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "report_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    IssuesByStatus,
    IssuesByPriority,
    IssuesByAssignee,
    TeamPerformance,
    ResolutionAnalytics,
    FeedbackSummary,
    PerformanceDashboard,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::IssuesByStatus => "issues_by_status",
            ReportType::IssuesByPriority => "issues_by_priority",
            ReportType::IssuesByAssignee => "issues_by_assignee",
            ReportType::TeamPerformance => "team_performance",
            ReportType::ResolutionAnalytics => "resolution_analytics",
            ReportType::FeedbackSummary => "feedback_summary",
            ReportType::PerformanceDashboard => "performance_dashboard",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReportType::IssuesByStatus => "Issues by Status",
            ReportType::IssuesByPriority => "Issues by Priority",
            ReportType::IssuesByAssignee => "Issues by Assignee",
            ReportType::TeamPerformance => "Team Performance",
            ReportType::ResolutionAnalytics => "Resolution Analytics",
            ReportType::FeedbackSummary => "Feedback Summary",
            ReportType::PerformanceDashboard => "Performance Dashboard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "report_format", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    Csv,
    Pdf,
    Json,
    Html,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Pdf => "pdf",
            ReportFormat::Json => "json",
            ReportFormat::Html => "html",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "text/csv; charset=utf-8",
            ReportFormat::Pdf => "application/pdf",
            ReportFormat::Json => "application/json",
            ReportFormat::Html => "text/html; charset=utf-8",
        }
    }
}

/// Generation lifecycle: `pending -> processing -> generated | failed`.
/// A failed attempt goes back to `pending` until retries run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "report_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Processing,
    Generated,
    Failed,
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportStatus::Pending => write!(f, "pending"),
            ReportStatus::Processing => write!(f, "processing"),
            ReportStatus::Generated => write!(f, "generated"),
            ReportStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Analytics filters, stored as JSONB on the report row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReportParameters {
    /// Inclusive; defaults to 30 days before `end_date`
    pub start_date: Option<NaiveDate>,
    /// Inclusive; defaults to today
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Vec<IssuePriority>,
    #[serde(default)]
    pub status: Vec<IssueStatus>,
}

impl ReportParameters {
    /// Rejects dates outside the supported calendar range
    pub fn validate_range(&self) -> Result<()> {
        for (field, date) in [("start_date", self.start_date), ("end_date", self.end_date)] {
            if let Some(date) = date {
                if !(MIN_ANALYTICS_YEAR..=MAX_ANALYTICS_YEAR).contains(&date.year()) {
                    return Err(AppError::Validation(format!(
                        "{} must be between {}-01-01 and {}-12-31",
                        field, MIN_ANALYTICS_YEAR, MAX_ANALYTICS_YEAR
                    )));
                }
            }
        }
        Ok(())
    }
}

pub const REPORT_COLUMNS: &str = "id, name, report_type, format, requested_by_id, status, \
    parameters, file_key, file_size, error_message, retry_count, next_attempt_at, \
    generated_at, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct Report {
    pub id: Uuid,
    pub name: String,
    pub report_type: ReportType,
    pub format: ReportFormat,
    pub requested_by_id: Uuid,
    pub status: ReportStatus,
    pub parameters: Json<ReportParameters>,
    pub file_key: Option<String>,
    pub file_size: Option<i64>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub generated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    pub fn is_downloadable(&self) -> bool {
        self.status == ReportStatus::Generated && self.file_key.is_some()
    }

    /// `report_{type}_{yyyymmdd}.{ext}`
    pub fn download_name(&self) -> String {
        format!(
            "report_{}_{}.{}",
            self.report_type.as_str(),
            self.created_at.format("%Y%m%d"),
            self.format.extension()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_accept_ordinary_dates() {
        let params = ReportParameters {
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 1, 31),
            ..Default::default()
        };
        assert!(params.validate_range().is_ok());
        assert!(ReportParameters::default().validate_range().is_ok());
    }

    #[test]
    fn test_parameters_reject_extreme_dates() {
        let far_future: ReportParameters =
            serde_json::from_str(r#"{"end_date":"+262142-12-31"}"#).unwrap();
        match far_future.validate_range() {
            Err(AppError::Validation(msg)) => assert!(msg.contains("end_date")),
            other => panic!("unexpected: {:?}", other),
        }

        let far_past: ReportParameters =
            serde_json::from_str(r#"{"start_date":"-262143-01-01"}"#).unwrap();
        assert!(matches!(
            far_past.validate_range(),
            Err(AppError::Validation(_))
        ));
    }
}
