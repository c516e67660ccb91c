use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    NewIssue,
    Assignment,
    StatusChange,
    NewComment,
    Mention,
    FeedbackConverted,
    FeedbackAcknowledged,
}

impl NotificationType {
    /// Short title used as the email subject
    pub fn title(&self) -> &'static str {
        match self {
            NotificationType::NewIssue => "New issue",
            NotificationType::Assignment => "Issue assigned to you",
            NotificationType::StatusChange => "Issue status changed",
            NotificationType::NewComment => "New comment",
            NotificationType::Mention => "You were mentioned",
            NotificationType::FeedbackConverted => "Your feedback became an issue",
            NotificationType::FeedbackAcknowledged => "Your feedback was acknowledged",
        }
    }
}

pub const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, notification_type, message, issue_id, is_read, created_at";

#[derive(Debug, Clone, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub notification_type: NotificationType,
    pub message: String,
    pub issue_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_serializes_snake_case() {
        let json = serde_json::to_string(&NotificationType::FeedbackAcknowledged).unwrap();
        assert_eq!(json, "\"feedback_acknowledged\"");
        let parsed: NotificationType = serde_json::from_str("\"status_change\"").unwrap();
        assert_eq!(parsed, NotificationType::StatusChange);
    }
}
