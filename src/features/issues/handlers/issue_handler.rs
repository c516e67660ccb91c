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
use crate::features::auth::guards::{RequireManager, RequireStaff};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::issues::dtos::{
    AssignIssueDto, CreateIssueDto, IssueFilterQuery, IssueHistoryResponseDto, IssueResponseDto,
    TransitionIssueDto, UpdateIssueDto,
};
use crate::features::issues::models::IssueStatus;
use crate::features::issues::services::IssueService;
use crate::shared::types::{ApiResponse, Meta, PaginationQuery};

/// Report a new issue
#[utoipa::path(
    post,
    path = "/api/issues",
    request_body = CreateIssueDto,
    responses(
        (status = 201, description = "Issue created", body = ApiResponse<IssueResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "issues",
    security(("bearer_auth" = []))
)]
pub async fn create_issue(
    user: AuthenticatedUser,
    State(service): State<Arc<IssueService>>,
    AppJson(dto): AppJson<CreateIssueDto>,
) -> Result<(StatusCode, Json<ApiResponse<IssueResponseDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let issue = service.create(&user, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(issue.into()),
            Some("Issue created successfully".to_string()),
            None,
        )),
    ))
}

/// List issues visible to the caller
#[utoipa::path(
    get,
    path = "/api/issues",
    params(PaginationQuery, IssueFilterQuery),
    responses(
        (status = 200, description = "Issues", body = ApiResponse<Vec<IssueResponseDto>>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "issues",
    security(("bearer_auth" = []))
)]
pub async fn list_issues(
    user: AuthenticatedUser,
    State(service): State<Arc<IssueService>>,
    Query(pagination): Query<PaginationQuery>,
    Query(filter): Query<IssueFilterQuery>,
) -> Result<Json<ApiResponse<Vec<IssueResponseDto>>>> {
    let (issues, total) = service.list(&user, &filter, &pagination).await?;
    let items = issues.into_iter().map(IssueResponseDto::from).collect();
    Ok(Json(ApiResponse::success(
        Some(items),
        None,
        Some(Meta::paginated(total, &pagination)),
    )))
}

/// Get an issue
#[utoipa::path(
    get,
    path = "/api/issues/{id}",
    params(("id" = Uuid, Path, description = "Issue ID")),
    responses(
        (status = 200, description = "Issue", body = ApiResponse<IssueResponseDto>),
        (status = 404, description = "Issue not found")
    ),
    tag = "issues",
    security(("bearer_auth" = []))
)]
pub async fn get_issue(
    user: AuthenticatedUser,
    State(service): State<Arc<IssueService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<IssueResponseDto>>> {
    let issue = service.get(&user, id).await?;
    Ok(Json(ApiResponse::success(Some(issue.into()), None, None)))
}

/// Update title, description, priority or due date
#[utoipa::path(
    patch,
    path = "/api/issues/{id}",
    params(("id" = Uuid, Path, description = "Issue ID")),
    request_body = UpdateIssueDto,
    responses(
        (status = 200, description = "Issue updated", body = ApiResponse<IssueResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Staff access required"),
        (status = 404, description = "Issue not found")
    ),
    tag = "issues",
    security(("bearer_auth" = []))
)]
pub async fn update_issue(
    RequireStaff(user): RequireStaff,
    State(service): State<Arc<IssueService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<UpdateIssueDto>,
) -> Result<Json<ApiResponse<IssueResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let issue = service.update(&user, id, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(issue.into()),
        Some("Issue updated successfully".to_string()),
        None,
    )))
}

/// Delete an issue
#[utoipa::path(
    delete,
    path = "/api/issues/{id}",
    params(("id" = Uuid, Path, description = "Issue ID")),
    responses(
        (status = 200, description = "Issue deleted"),
        (status = 403, description = "Manager access required"),
        (status = 404, description = "Issue not found")
    ),
    tag = "issues",
    security(("bearer_auth" = []))
)]
pub async fn delete_issue(
    RequireManager(user): RequireManager,
    State(service): State<Arc<IssueService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete(&user, id).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Issue deleted successfully".to_string()),
        None,
    )))
}

/// Assign an issue to a staff member
#[utoipa::path(
    post,
    path = "/api/issues/{id}/assign",
    params(("id" = Uuid, Path, description = "Issue ID")),
    request_body = AssignIssueDto,
    responses(
        (status = 200, description = "Issue assigned", body = ApiResponse<IssueResponseDto>),
        (status = 400, description = "Assignee is not an active staff member"),
        (status = 403, description = "Staff access required"),
        (status = 404, description = "Issue not found")
    ),
    tag = "issues",
    security(("bearer_auth" = []))
)]
pub async fn assign_issue(
    RequireStaff(user): RequireStaff,
    State(service): State<Arc<IssueService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<AssignIssueDto>,
) -> Result<Json<ApiResponse<IssueResponseDto>>> {
    let issue = service.assign(&user, id, dto.assignee_id).await?;
    Ok(Json(ApiResponse::success(
        Some(issue.into()),
        Some("Issue assigned successfully".to_string()),
        None,
    )))
}

/// Change the status of an issue
///
/// Moving to the current status is accepted and changes nothing.
#[utoipa::path(
    post,
    path = "/api/issues/{id}/transition",
    params(("id" = Uuid, Path, description = "Issue ID")),
    request_body = TransitionIssueDto,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<IssueResponseDto>),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "Staff access required"),
        (status = 404, description = "Issue not found")
    ),
    tag = "issues",
    security(("bearer_auth" = []))
)]
pub async fn transition_issue(
    RequireStaff(user): RequireStaff,
    State(service): State<Arc<IssueService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<TransitionIssueDto>,
) -> Result<Json<ApiResponse<IssueResponseDto>>> {
    let target: IssueStatus = dto.new_status.parse().map_err(AppError::Validation)?;

    let (issue, changed) = service.transition(&user, id, target).await?;
    let message = if changed {
        format!("Status changed to {}", target)
    } else {
        format!("Issue is already {}", target)
    };
    Ok(Json(ApiResponse::success(
        Some(issue.into()),
        Some(message),
        None,
    )))
}

/// Status history of an issue, oldest first
#[utoipa::path(
    get,
    path = "/api/issues/{id}/history",
    params(("id" = Uuid, Path, description = "Issue ID")),
    responses(
        (status = 200, description = "History", body = ApiResponse<Vec<IssueHistoryResponseDto>>),
        (status = 404, description = "Issue not found")
    ),
    tag = "issues",
    security(("bearer_auth" = []))
)]
pub async fn get_issue_history(
    user: AuthenticatedUser,
    State(service): State<Arc<IssueService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<IssueHistoryResponseDto>>>> {
    let history = service.history(&user, id).await?;
    let total = history.len() as i64;
    let items = history.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(
        Some(items),
        None,
        Some(Meta::total(total)),
    )))
}
