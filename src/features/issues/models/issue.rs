use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

/// Issue lifecycle status matching the `issue_status` database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "issue_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
    Reopen,
}

impl IssueStatus {
    pub const ALL: [IssueStatus; 5] = [
        IssueStatus::Open,
        IssueStatus::InProgress,
        IssueStatus::Resolved,
        IssueStatus::Closed,
        IssueStatus::Reopen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "open",
            IssueStatus::InProgress => "in_progress",
            IssueStatus::Resolved => "resolved",
            IssueStatus::Closed => "closed",
            IssueStatus::Reopen => "reopen",
        }
    }

    /// Resolved and closed issues carry a `resolved_at` timestamp
    pub fn is_terminal(&self) -> bool {
        matches!(self, IssueStatus::Resolved | IssueStatus::Closed)
    }

    pub fn allowed_values() -> String {
        Self::ALL
            .iter()
            .map(IssueStatus::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IssueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        IssueStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| {
                format!(
                    "Invalid status '{}'. Allowed values: {}",
                    value,
                    IssueStatus::allowed_values()
                )
            })
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Type, ToSchema,
)]
#[sqlx(type_name = "issue_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IssuePriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl IssuePriority {
    pub const ALL: [IssuePriority; 4] = [
        IssuePriority::Low,
        IssuePriority::Medium,
        IssuePriority::High,
        IssuePriority::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssuePriority::Low => "low",
            IssuePriority::Medium => "medium",
            IssuePriority::High => "high",
            IssuePriority::Critical => "critical",
        }
    }
}

impl std::fmt::Display for IssuePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IssuePriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        IssuePriority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == value)
            .ok_or_else(|| {
                let allowed: Vec<&str> = IssuePriority::ALL.iter().map(|p| p.as_str()).collect();
                format!(
                    "Invalid priority '{}'. Allowed values: {}",
                    value,
                    allowed.join(", ")
                )
            })
    }
}

pub const ISSUE_COLUMNS: &str = "id, title, description, status, priority, reporter_id, \
    assignee_id, created_by_id, due_date, resolved_at, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct Issue {
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

/// Data for inserting a new issue; status always starts as `open`
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub priority: IssuePriority,
    pub reporter_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub created_by_id: Uuid,
    pub due_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!("in_progress".parse::<IssueStatus>(), Ok(IssueStatus::InProgress));
        assert_eq!(" reopen ".parse::<IssueStatus>(), Ok(IssueStatus::Reopen));

        let err = "done".parse::<IssueStatus>().unwrap_err();
        assert_eq!(
            err,
            "Invalid status 'done'. Allowed values: open, in_progress, resolved, closed, reopen"
        );
    }

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<_> = IssueStatus::ALL
            .into_iter()
            .filter(IssueStatus::is_terminal)
            .collect();
        assert_eq!(terminal, vec![IssueStatus::Resolved, IssueStatus::Closed]);
    }

    #[test]
    fn test_priority_default_is_medium() {
        assert_eq!(IssuePriority::default(), IssuePriority::Medium);
        let parsed: IssuePriority = serde_json::from_str("\"critical\"").unwrap();
        assert_eq!(parsed, IssuePriority::Critical);
    }
}
