use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::features::feedback::models::{Feedback, FeedbackStatus};
use crate::features::issues::dtos::IssueResponseDto;
use crate::features::issues::models::IssuePriority;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeedbackResponseDto {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub email: Option<String>,
    pub user_id: Option<Uuid>,
    pub status: FeedbackStatus,
    pub converted_to_issue_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Feedback> for FeedbackResponseDto {
    fn from(f: Feedback) -> Self {
        Self {
            id: f.id,
            title: f.title,
            description: f.description,
            email: f.email,
            user_id: f.user_id,
            status: f.status,
            converted_to_issue_id: f.converted_to_issue_id,
            created_at: f.created_at,
            updated_at: f.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateFeedbackDto {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 10000, message = "Description must be 1-10000 characters"))]
    pub description: String,

    /// Contact address for anonymous submissions
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateFeedbackDto {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 10000, message = "Description must be 1-10000 characters"))]
    pub description: Option<String>,
}

/// Overrides for the issue created from feedback; missing fields fall back
/// to the feedback's own title and description
#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct ConvertFeedbackDto {
    #[validate(length(max = 255, message = "Title must be at most 255 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 10000, message = "Description must be at most 10000 characters"))]
    pub description: Option<String>,

    pub priority: Option<IssuePriority>,

    pub assignee_id: Option<Uuid>,

    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConversionResultDto {
    pub feedback: FeedbackResponseDto,
    pub issue: IssueResponseDto,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FeedbackFilterQuery {
    pub status: Option<FeedbackStatus>,
    /// Case-insensitive match on title, description or email
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_feedback_email_is_validated() {
        let dto = CreateFeedbackDto {
            title: "Dark mode".to_string(),
            description: "Please add it".to_string(),
            email: Some("nope".to_string()),
        };
        assert!(dto.validate().is_err());

        let anonymous = CreateFeedbackDto {
            email: None,
            ..dto
        };
        assert!(anonymous.validate().is_ok());
    }
}
