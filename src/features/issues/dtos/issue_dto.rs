use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::features::issues::models::{Issue, IssueHistory, IssuePriority, IssueStatus};
use crate::shared::types::double_option;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IssueResponseDto {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: IssueStatus,
    pub priority: IssuePriority,
    pub reporter_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub created_by_id: Uuid,
    pub due_date: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Issue> for IssueResponseDto {
    fn from(i: Issue) -> Self {
        Self {
            id: i.id,
            title: i.title,
            description: i.description,
            status: i.status,
            priority: i.priority,
            reporter_id: i.reporter_id,
            assignee_id: i.assignee_id,
            created_by_id: i.created_by_id,
            due_date: i.due_date,
            resolved_at: i.resolved_at,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IssueHistoryResponseDto {
    pub id: Uuid,
    pub changed_by_id: Option<Uuid>,
    pub old_status: Option<IssueStatus>,
    pub new_status: IssueStatus,
    pub changed_at: DateTime<Utc>,
}

impl From<IssueHistory> for IssueHistoryResponseDto {
    fn from(h: IssueHistory) -> Self {
        Self {
            id: h.id,
            changed_by_id: h.changed_by_id,
            old_status: h.old_status,
            new_status: h.new_status,
            changed_at: h.changed_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateIssueDto {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 10000, message = "Description must be 1-10000 characters"))]
    pub description: String,

    pub priority: Option<IssuePriority>,

    /// Staff only; clients always report their own issues
    pub reporter_id: Option<Uuid>,

    /// Staff only
    pub assignee_id: Option<Uuid>,

    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateIssueDto {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 10000, message = "Description must be 1-10000 characters"))]
    pub description: Option<String>,

    pub priority: Option<IssuePriority>,

    /// Omit to keep, `null` to clear
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssignIssueDto {
    pub assignee_id: Uuid,
}

/// Target status as free text so unknown values get a descriptive error
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransitionIssueDto {
    #[schema(example = "in_progress")]
    pub new_status: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IssueFilterQuery {
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
    pub assignee_id: Option<Uuid>,
    pub reporter_id: Option<Uuid>,
    /// Case-insensitive match on title or description
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_dto_requires_title() {
        let dto = CreateIssueDto {
            title: String::new(),
            description: "Something broke".to_string(),
            priority: None,
            reporter_id: None,
            assignee_id: None,
            due_date: None,
        };
        let err = dto.validate().unwrap_err();
        assert!(err.field_errors().contains_key("title"));
    }

    #[test]
    fn test_update_dto_allows_empty_patch() {
        let dto: UpdateIssueDto = serde_json::from_str("{}").unwrap();
        assert!(dto.validate().is_ok());
        assert_eq!(dto.due_date, None);
    }

    #[test]
    fn test_update_dto_null_due_date_clears() {
        let dto: UpdateIssueDto = serde_json::from_str(r#"{"due_date":null}"#).unwrap();
        assert_eq!(dto.due_date, Some(None));

        let dto: UpdateIssueDto =
            serde_json::from_str(r#"{"due_date":"2025-06-30T17:00:00Z"}"#).unwrap();
        let due = dto.due_date.flatten().unwrap();
        assert_eq!(due.to_rfc3339(), "2025-06-30T17:00:00+00:00");
    }
}
