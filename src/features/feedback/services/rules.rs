//! Feedback state rules, kept free of I/O.

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::feedback::dtos::ConvertFeedbackDto;
use crate::features::feedback::models::{Feedback, FeedbackStatus};

/// Converted feedback can never be converted again
pub fn ensure_convertible(feedback: &Feedback) -> Result<()> {
    match feedback.status {
        FeedbackStatus::Converted => Err(AppError::Conflict(format!(
            "Feedback {} has already been converted to an issue",
            feedback.id
        ))),
        _ => Ok(()),
    }
}

pub fn ensure_acknowledgeable(feedback: &Feedback) -> Result<()> {
    match feedback.status {
        FeedbackStatus::New => Ok(()),
        status => Err(AppError::BadRequest(format!(
            "Only new feedback can be acknowledged (feedback is {})",
            status
        ))),
    }
}

pub fn ensure_closable(feedback: &Feedback) -> Result<()> {
    match feedback.status {
        FeedbackStatus::Closed => Err(AppError::BadRequest(
            "Feedback is already closed".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Staff may read any feedback, submitters their own
pub fn can_view(actor: &AuthenticatedUser, feedback: &Feedback) -> bool {
    actor.is_staff() || feedback.user_id == Some(actor.user_id)
}

/// Staff may always edit; submitters only while the feedback is still new
pub fn ensure_editable(actor: &AuthenticatedUser, feedback: &Feedback) -> Result<()> {
    if actor.is_staff() {
        return Ok(());
    }
    if feedback.user_id != Some(actor.user_id) {
        return Err(AppError::Forbidden(
            "You can only edit your own feedback".to_string(),
        ));
    }
    if feedback.status != FeedbackStatus::New {
        return Err(AppError::BadRequest(
            "Feedback can only be edited while it is new".to_string(),
        ));
    }
    Ok(())
}

/// Title and description for the new issue, preferring non-blank overrides
pub fn conversion_content(feedback: &Feedback, dto: &ConvertFeedbackDto) -> (String, String) {
    let pick = |value: &Option<String>, fallback: &str| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(fallback)
            .to_string()
    };
    (
        pick(&dto.title, &feedback.title),
        pick(&dto.description, &feedback.description),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::users::models::UserRole;
    use crate::shared::test_helpers::test_user;
    use chrono::Utc;
    use uuid::Uuid;

    fn feedback(status: FeedbackStatus, user_id: Option<Uuid>) -> Feedback {
        Feedback {
            id: Uuid::new_v4(),
            title: "Export is slow".to_string(),
            description: "Takes a minute".to_string(),
            email: None,
            user_id,
            status,
            converted_to_issue_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_converted_feedback_always_conflicts() {
        let converted = feedback(FeedbackStatus::Converted, None);
        assert!(matches!(
            ensure_convertible(&converted),
            Err(AppError::Conflict(_))
        ));

        for status in [
            FeedbackStatus::New,
            FeedbackStatus::Acknowledged,
            FeedbackStatus::Closed,
        ] {
            assert!(ensure_convertible(&feedback(status, None)).is_ok());
        }
    }

    #[test]
    fn test_acknowledge_only_from_new() {
        assert!(ensure_acknowledgeable(&feedback(FeedbackStatus::New, None)).is_ok());
        assert!(ensure_acknowledgeable(&feedback(FeedbackStatus::Acknowledged, None)).is_err());
        assert!(ensure_closable(&feedback(FeedbackStatus::Closed, None)).is_err());
        assert!(ensure_closable(&feedback(FeedbackStatus::Converted, None)).is_ok());
    }

    #[test]
    fn test_owner_edits_only_while_new() {
        let owner = test_user(UserRole::Client);
        let fresh = feedback(FeedbackStatus::New, Some(owner.user_id));
        assert!(ensure_editable(&owner, &fresh).is_ok());
        assert!(can_view(&owner, &fresh));

        let acknowledged = feedback(FeedbackStatus::Acknowledged, Some(owner.user_id));
        assert!(matches!(
            ensure_editable(&owner, &acknowledged),
            Err(AppError::BadRequest(_))
        ));
        assert!(ensure_editable(&test_user(UserRole::Staff), &acknowledged).is_ok());

        let stranger = test_user(UserRole::Client);
        assert!(!can_view(&stranger, &fresh));
        assert!(matches!(
            ensure_editable(&stranger, &fresh),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_conversion_content_fallbacks() {
        let source = feedback(FeedbackStatus::New, None);
        let dto = ConvertFeedbackDto {
            title: Some("  ".to_string()),
            description: Some("Export of 10k rows takes 60s".to_string()),
            ..Default::default()
        };
        let (title, description) = conversion_content(&source, &dto);
        assert_eq!(title, "Export is slow");
        assert_eq!(description, "Export of 10k rows takes 60s");
    }
}
