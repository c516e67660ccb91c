use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::IssueStatus;

pub const ISSUE_HISTORY_COLUMNS: &str =
    "id, issue_id, changed_by_id, old_status, new_status, changed_at";

/// Append-only record of a status change. `old_status` is empty for creation.
#[derive(Debug, Clone, FromRow)]
pub struct IssueHistory {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub changed_by_id: Option<Uuid>,
    pub old_status: Option<IssueStatus>,
    pub new_status: IssueStatus,
    pub changed_at: DateTime<Utc>,
}
