use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::reports::models::{
    Report, ReportFormat, ReportParameters, ReportStatus, ReportType,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReportResponseDto {
    pub id: Uuid,
    pub name: String,
    pub report_type: ReportType,
    pub format: ReportFormat,
    pub requested_by_id: Uuid,
    pub status: ReportStatus,
    pub parameters: ReportParameters,
    pub file_size: Option<i64>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub generated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Report> for ReportResponseDto {
    fn from(r: Report) -> Self {
        Self {
            id: r.id,
            name: r.name,
            report_type: r.report_type,
            format: r.format,
            requested_by_id: r.requested_by_id,
            status: r.status,
            parameters: r.parameters.0,
            file_size: r.file_size,
            error_message: r.error_message,
            retry_count: r.retry_count,
            generated_at: r.generated_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Lightweight payload for status polling
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReportStatusDto {
    pub id: Uuid,
    pub status: ReportStatus,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub result_available: bool,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Report> for ReportStatusDto {
    fn from(r: &Report) -> Self {
        Self {
            id: r.id,
            status: r.status,
            error_message: r.error_message.clone(),
            retry_count: r.retry_count,
            result_available: r.is_downloadable(),
            next_attempt_at: (r.status == ReportStatus::Pending).then_some(r.next_attempt_at),
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateReportDto {
    /// Defaults to the report type and today's date
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,

    pub report_type: ReportType,

    pub format: ReportFormat,

    #[serde(default)]
    pub parameters: ReportParameters,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportFilterQuery {
    pub status: Option<ReportStatus>,
    pub report_type: Option<ReportType>,
}

/// Date range and filters shared by analytics and export
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AnalyticsQuery {
    /// Inclusive, `YYYY-MM-DD`; defaults to 30 days before `end_date`
    pub start_date: Option<NaiveDate>,
    /// Inclusive, `YYYY-MM-DD`; defaults to today
    pub end_date: Option<NaiveDate>,
    /// Comma separated issue statuses
    pub status: Option<String>,
    /// Comma separated issue priorities
    pub priority: Option<String>,
}

fn parse_list<T>(value: Option<&str>) -> Result<Vec<T>>
where
    T: FromStr<Err = String>,
{
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse::<T>().map_err(AppError::Validation))
        .collect()
}

impl AnalyticsQuery {
    pub fn parameters(&self) -> Result<ReportParameters> {
        let params = ReportParameters {
            start_date: self.start_date,
            end_date: self.end_date,
            status: parse_list(self.status.as_deref())?,
            priority: parse_list(self.priority.as_deref())?,
        };
        params.validate_range()?;
        Ok(params)
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportQuery {
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct IssueMetricsDto {
    pub total: i64,
    pub open: i64,
    pub in_progress: i64,
    pub unresolved: i64,
    pub high_priority: i64,
    pub critical: i64,
    pub recent_24h: i64,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct FeedbackMetricsDto {
    pub total: i64,
    /// Feedback still in `new`
    pub pending: i64,
    pub recent_24h: i64,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserMetricsDto {
    pub total: i64,
    pub active: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MetricsDto {
    pub issues: IssueMetricsDto,
    pub feedback: FeedbackMetricsDto,
    pub users: UserMetricsDto,
    pub updated_at: DateTime<Utc>,
    /// Start of the `recent_24h` window
    pub since: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::issues::models::{IssuePriority, IssueStatus};

    #[test]
    fn test_analytics_query_parses_lists() {
        let query = AnalyticsQuery {
            status: Some("open, in_progress,".to_string()),
            priority: Some("critical".to_string()),
            ..Default::default()
        };
        let params = query.parameters().unwrap();
        assert_eq!(params.status, vec![IssueStatus::Open, IssueStatus::InProgress]);
        assert_eq!(params.priority, vec![IssuePriority::Critical]);
    }

    #[test]
    fn test_analytics_query_rejects_unknown_values() {
        let query = AnalyticsQuery {
            status: Some("open,done".to_string()),
            ..Default::default()
        };
        match query.parameters() {
            Err(AppError::Validation(msg)) => assert!(msg.contains("'done'")),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_analytics_query_rejects_out_of_range_end_date() {
        let query: AnalyticsQuery =
            serde_json::from_value(serde_json::json!({ "end_date": "+262142-12-31" })).unwrap();
        assert!(matches!(query.parameters(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_create_dto_defaults_parameters() {
        let dto: CreateReportDto = serde_json::from_value(serde_json::json!({
            "report_type": "team_performance",
            "format": "pdf"
        }))
        .unwrap();
        assert_eq!(dto.parameters, ReportParameters::default());
        assert!(dto.validate().is_ok());
    }
}
