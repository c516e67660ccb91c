use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::attachments::{dtos as attachments_dtos, handlers as attachments_handlers};
use crate::features::auth;
use crate::features::comments::{
    dtos as comments_dtos, handlers as comments_handlers, models as comments_models,
};
use crate::features::feedback::{
    dtos as feedback_dtos, handlers as feedback_handlers, models as feedback_models,
};
use crate::features::issues::{
    dtos as issues_dtos, handlers as issues_handlers, models as issues_models,
};
use crate::features::notifications::{
    dtos as notifications_dtos, handlers as notifications_handlers,
    models as notifications_models,
};
use crate::features::reports::services::analytics;
use crate::features::reports::{
    dtos as reports_dtos, handlers as reports_handlers, models as reports_models,
};
use crate::features::users::{
    dtos as users_dtos, handlers as users_handlers, models as users_models,
};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Auth
        auth::handlers::register,
        auth::handlers::login,
        auth::handlers::refresh_token,
        auth::handlers::logout,
        auth::handlers::get_me,
        auth::handlers::change_password,
        // Users
        users_handlers::get_profile,
        users_handlers::update_profile,
        users_handlers::list_users,
        users_handlers::list_staff,
        users_handlers::get_user,
        users_handlers::update_user,
        users_handlers::deactivate_user,
        // Issues
        issues_handlers::create_issue,
        issues_handlers::list_issues,
        issues_handlers::get_issue,
        issues_handlers::update_issue,
        issues_handlers::delete_issue,
        issues_handlers::assign_issue,
        issues_handlers::transition_issue,
        issues_handlers::get_issue_history,
        // Comments
        comments_handlers::list_comments,
        comments_handlers::create_comment,
        comments_handlers::update_comment,
        comments_handlers::delete_comment,
        // Feedback
        feedback_handlers::create_feedback,
        feedback_handlers::list_feedback,
        feedback_handlers::my_feedback,
        feedback_handlers::get_feedback,
        feedback_handlers::update_feedback,
        feedback_handlers::delete_feedback,
        feedback_handlers::acknowledge_feedback,
        feedback_handlers::close_feedback,
        feedback_handlers::convert_feedback,
        // Attachments
        attachments_handlers::upload_attachment,
        attachments_handlers::list_attachments,
        attachments_handlers::get_attachment,
        attachments_handlers::link_attachment,
        attachments_handlers::delete_attachment,
        attachments_handlers::download_attachment,
        // Notifications
        notifications_handlers::list_notifications,
        notifications_handlers::unread_count,
        notifications_handlers::mark_read,
        notifications_handlers::mark_all_read,
        notifications_handlers::delete_notification,
        // Reports
        reports_handlers::create_report,
        reports_handlers::list_reports,
        reports_handlers::get_report,
        reports_handlers::get_report_status,
        reports_handlers::download_report,
        reports_handlers::delete_report,
        reports_handlers::get_analytics,
        reports_handlers::get_metrics,
        reports_handlers::export_issues,
    ),
    components(
        schemas(
            // Shared
            Meta,
            // Auth
            auth::model::AuthenticatedUser,
            auth::dtos::RegisterRequestDto,
            auth::dtos::LoginRequestDto,
            auth::dtos::RefreshTokenRequestDto,
            auth::dtos::RefreshTokenResponseDto,
            auth::dtos::ChangePasswordRequestDto,
            auth::dtos::AuthResponseDto,
            ApiResponse<auth::dtos::AuthResponseDto>,
            ApiResponse<auth::dtos::RefreshTokenResponseDto>,
            // Users
            users_models::UserRole,
            users_dtos::UserResponseDto,
            users_dtos::UpdateProfileDto,
            users_dtos::AdminUpdateUserDto,
            ApiResponse<users_dtos::UserResponseDto>,
            ApiResponse<Vec<users_dtos::UserResponseDto>>,
            // Issues
            issues_models::IssueStatus,
            issues_models::IssuePriority,
            issues_dtos::IssueResponseDto,
            issues_dtos::IssueHistoryResponseDto,
            issues_dtos::CreateIssueDto,
            issues_dtos::UpdateIssueDto,
            issues_dtos::AssignIssueDto,
            issues_dtos::TransitionIssueDto,
            ApiResponse<issues_dtos::IssueResponseDto>,
            ApiResponse<Vec<issues_dtos::IssueResponseDto>>,
            ApiResponse<Vec<issues_dtos::IssueHistoryResponseDto>>,
            // Comments
            comments_models::CommentVisibility,
            comments_dtos::CommentResponseDto,
            comments_dtos::CreateCommentDto,
            comments_dtos::UpdateCommentDto,
            ApiResponse<comments_dtos::CommentResponseDto>,
            ApiResponse<Vec<comments_dtos::CommentResponseDto>>,
            // Feedback
            feedback_models::FeedbackStatus,
            feedback_dtos::FeedbackResponseDto,
            feedback_dtos::CreateFeedbackDto,
            feedback_dtos::UpdateFeedbackDto,
            feedback_dtos::ConvertFeedbackDto,
            feedback_dtos::ConversionResultDto,
            ApiResponse<feedback_dtos::FeedbackResponseDto>,
            ApiResponse<Vec<feedback_dtos::FeedbackResponseDto>>,
            ApiResponse<feedback_dtos::ConversionResultDto>,
            // Attachments
            attachments_dtos::AttachmentResponseDto,
            attachments_dtos::UploadAttachmentDto,
            attachments_dtos::LinkAttachmentDto,
            ApiResponse<attachments_dtos::AttachmentResponseDto>,
            ApiResponse<Vec<attachments_dtos::AttachmentResponseDto>>,
            // Notifications
            notifications_models::NotificationType,
            notifications_dtos::NotificationResponseDto,
            notifications_dtos::UnreadCountDto,
            notifications_dtos::MarkAllReadDto,
            ApiResponse<notifications_dtos::NotificationResponseDto>,
            ApiResponse<Vec<notifications_dtos::NotificationResponseDto>>,
            ApiResponse<notifications_dtos::UnreadCountDto>,
            ApiResponse<notifications_dtos::MarkAllReadDto>,
            // Reports
            reports_models::ReportType,
            reports_models::ReportFormat,
            reports_models::ReportStatus,
            reports_models::ReportParameters,
            reports_dtos::ReportResponseDto,
            reports_dtos::ReportStatusDto,
            reports_dtos::CreateReportDto,
            reports_dtos::IssueMetricsDto,
            reports_dtos::FeedbackMetricsDto,
            reports_dtos::UserMetricsDto,
            reports_dtos::MetricsDto,
            analytics::AnalyticsReport,
            analytics::AnalyticsPeriod,
            analytics::AnalyticsSummary,
            analytics::CountShare,
            analytics::TeamMemberStats,
            analytics::DailyTrend,
            analytics::FeedbackSummary,
            ApiResponse<reports_dtos::ReportResponseDto>,
            ApiResponse<Vec<reports_dtos::ReportResponseDto>>,
            ApiResponse<reports_dtos::ReportStatusDto>,
            ApiResponse<reports_dtos::MetricsDto>,
            ApiResponse<analytics::AnalyticsReport>,
        )
    ),
    tags(
        (name = "auth", description = "Registration, login and token rotation"),
        (name = "users", description = "Profiles and user administration"),
        (name = "issues", description = "Issue tracking, assignment and status transitions"),
        (name = "comments", description = "Issue comments, internal notes and mentions"),
        (name = "feedback", description = "Client feedback and conversion to issues"),
        (name = "attachments", description = "File upload and download"),
        (name = "notifications", description = "In-app notifications"),
        (name = "reports", description = "Analytics, metrics and generated reports"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Feedback Tracker API",
        version = "0.1.0",
        description = "Client feedback, issue tracking and analytics API",
    )
)]
pub struct ApiDoc;

/// Adds Bearer JWT security scheme to the OpenAPI document
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_feature_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/auth/login",
            "/api/issues/{id}/transition",
            "/api/feedback/{id}/convert",
            "/api/attachments/{id}/download",
            "/api/notifications/unread-count",
            "/api/reports/analytics",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_bearer_scheme_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn test_info_modifier_overrides_title() {
        let mut doc = ApiDoc::openapi();
        SwaggerInfoModifier {
            title: "Tracker".into(),
            version: "9.9.9".into(),
            description: "d".into(),
        }
        .modify(&mut doc);
        assert_eq!(doc.info.title, "Tracker");
        assert_eq!(doc.info.version, "9.9.9");
    }
}
