use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::auth::guards::{MaybeUser, RequireManager, RequireStaff};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::feedback::dtos::{
    ConversionResultDto, ConvertFeedbackDto, CreateFeedbackDto, FeedbackFilterQuery,
    FeedbackResponseDto, UpdateFeedbackDto,
};
use crate::features::feedback::services::FeedbackService;
use crate::shared::types::{ApiResponse, Meta, PaginationQuery};

/// Submit feedback
///
/// Open to anonymous visitors; a bearer token, when sent, links the feedback
/// to the account.
#[utoipa::path(
    post,
    path = "/api/feedback",
    request_body = CreateFeedbackDto,
    responses(
        (status = 201, description = "Feedback submitted", body = ApiResponse<FeedbackResponseDto>),
        (status = 400, description = "Validation error")
    ),
    tag = "feedback"
)]
pub async fn create_feedback(
    MaybeUser(user): MaybeUser,
    State(service): State<Arc<FeedbackService>>,
    AppJson(dto): AppJson<CreateFeedbackDto>,
) -> Result<(StatusCode, Json<ApiResponse<FeedbackResponseDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let feedback = service.create(user.as_ref(), dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(feedback.into()),
            Some("Thank you for your feedback".to_string()),
            None,
        )),
    ))
}

/// List all feedback
#[utoipa::path(
    get,
    path = "/api/feedback",
    params(PaginationQuery, FeedbackFilterQuery),
    responses(
        (status = 200, description = "Feedback", body = ApiResponse<Vec<FeedbackResponseDto>>),
        (status = 403, description = "Staff access required")
    ),
    tag = "feedback",
    security(("bearer_auth" = []))
)]
pub async fn list_feedback(
    RequireStaff(_user): RequireStaff,
    State(service): State<Arc<FeedbackService>>,
    Query(pagination): Query<PaginationQuery>,
    Query(filter): Query<FeedbackFilterQuery>,
) -> Result<Json<ApiResponse<Vec<FeedbackResponseDto>>>> {
    let (items, total) = service.list(&filter, None, &pagination).await?;
    let items = items.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(
        Some(items),
        None,
        Some(Meta::paginated(total, &pagination)),
    )))
}

/// List own feedback
#[utoipa::path(
    get,
    path = "/api/feedback/my",
    params(PaginationQuery, FeedbackFilterQuery),
    responses(
        (status = 200, description = "Own feedback", body = ApiResponse<Vec<FeedbackResponseDto>>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "feedback",
    security(("bearer_auth" = []))
)]
pub async fn my_feedback(
    user: AuthenticatedUser,
    State(service): State<Arc<FeedbackService>>,
    Query(pagination): Query<PaginationQuery>,
    Query(filter): Query<FeedbackFilterQuery>,
) -> Result<Json<ApiResponse<Vec<FeedbackResponseDto>>>> {
    let (items, total) = service
        .list(&filter, Some(user.user_id), &pagination)
        .await?;
    let items = items.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(
        Some(items),
        None,
        Some(Meta::paginated(total, &pagination)),
    )))
}

/// Get feedback
#[utoipa::path(
    get,
    path = "/api/feedback/{id}",
    params(("id" = Uuid, Path, description = "Feedback ID")),
    responses(
        (status = 200, description = "Feedback", body = ApiResponse<FeedbackResponseDto>),
        (status = 404, description = "Feedback not found")
    ),
    tag = "feedback",
    security(("bearer_auth" = []))
)]
pub async fn get_feedback(
    user: AuthenticatedUser,
    State(service): State<Arc<FeedbackService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FeedbackResponseDto>>> {
    let feedback = service.get(&user, id).await?;
    Ok(Json(ApiResponse::success(Some(feedback.into()), None, None)))
}

/// Edit feedback
#[utoipa::path(
    patch,
    path = "/api/feedback/{id}",
    params(("id" = Uuid, Path, description = "Feedback ID")),
    request_body = UpdateFeedbackDto,
    responses(
        (status = 200, description = "Feedback updated", body = ApiResponse<FeedbackResponseDto>),
        (status = 400, description = "Validation error or feedback no longer new"),
        (status = 404, description = "Feedback not found")
    ),
    tag = "feedback",
    security(("bearer_auth" = []))
)]
pub async fn update_feedback(
    user: AuthenticatedUser,
    State(service): State<Arc<FeedbackService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<UpdateFeedbackDto>,
) -> Result<Json<ApiResponse<FeedbackResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let feedback = service.update(&user, id, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(feedback.into()),
        Some("Feedback updated".to_string()),
        None,
    )))
}

/// Delete feedback
#[utoipa::path(
    delete,
    path = "/api/feedback/{id}",
    params(("id" = Uuid, Path, description = "Feedback ID")),
    responses(
        (status = 200, description = "Feedback deleted"),
        (status = 403, description = "Manager access required"),
        (status = 404, description = "Feedback not found")
    ),
    tag = "feedback",
    security(("bearer_auth" = []))
)]
pub async fn delete_feedback(
    RequireManager(user): RequireManager,
    State(service): State<Arc<FeedbackService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete(&user, id).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Feedback deleted".to_string()),
        None,
    )))
}

/// Acknowledge new feedback
#[utoipa::path(
    post,
    path = "/api/feedback/{id}/acknowledge",
    params(("id" = Uuid, Path, description = "Feedback ID")),
    responses(
        (status = 200, description = "Feedback acknowledged", body = ApiResponse<FeedbackResponseDto>),
        (status = 400, description = "Feedback is not new"),
        (status = 403, description = "Staff access required"),
        (status = 404, description = "Feedback not found")
    ),
    tag = "feedback",
    security(("bearer_auth" = []))
)]
pub async fn acknowledge_feedback(
    RequireStaff(user): RequireStaff,
    State(service): State<Arc<FeedbackService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FeedbackResponseDto>>> {
    let feedback = service.acknowledge(&user, id).await?;
    Ok(Json(ApiResponse::success(
        Some(feedback.into()),
        Some("Feedback acknowledged".to_string()),
        None,
    )))
}

/// Close feedback
#[utoipa::path(
    post,
    path = "/api/feedback/{id}/close",
    params(("id" = Uuid, Path, description = "Feedback ID")),
    responses(
        (status = 200, description = "Feedback closed", body = ApiResponse<FeedbackResponseDto>),
        (status = 400, description = "Feedback already closed"),
        (status = 403, description = "Staff access required"),
        (status = 404, description = "Feedback not found")
    ),
    tag = "feedback",
    security(("bearer_auth" = []))
)]
pub async fn close_feedback(
    RequireStaff(user): RequireStaff,
    State(service): State<Arc<FeedbackService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FeedbackResponseDto>>> {
    let feedback = service.close(&user, id).await?;
    Ok(Json(ApiResponse::success(
        Some(feedback.into()),
        Some("Feedback closed".to_string()),
        None,
    )))
}

/// Convert feedback into an issue
#[utoipa::path(
    post,
    path = "/api/feedback/{id}/convert",
    params(("id" = Uuid, Path, description = "Feedback ID")),
    request_body = ConvertFeedbackDto,
    responses(
        (status = 201, description = "Issue created from feedback", body = ApiResponse<ConversionResultDto>),
        (status = 403, description = "Staff access required"),
        (status = 404, description = "Feedback not found"),
        (status = 409, description = "Feedback already converted")
    ),
    tag = "feedback",
    security(("bearer_auth" = []))
)]
pub async fn convert_feedback(
    RequireStaff(user): RequireStaff,
    State(service): State<Arc<FeedbackService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<ConvertFeedbackDto>,
) -> Result<(StatusCode, Json<ApiResponse<ConversionResultDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let (feedback, issue) = service.convert(&user, id, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(ConversionResultDto {
                feedback: feedback.into(),
                issue: issue.into(),
            }),
            Some("Feedback converted to issue".to_string()),
            None,
        )),
    ))
}
