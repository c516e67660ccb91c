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
use crate::features::auth::model::AuthenticatedUser;
use crate::features::comments::dtos::{CommentResponseDto, CreateCommentDto, UpdateCommentDto};
use crate::features::comments::services::CommentService;
use crate::shared::types::{ApiResponse, Meta, PaginationQuery};

/// List comments on an issue
#[utoipa::path(
    get,
    path = "/api/issues/{id}/comments",
    params(("id" = Uuid, Path, description = "Issue ID"), PaginationQuery),
    responses(
        (status = 200, description = "Comments", body = ApiResponse<Vec<CommentResponseDto>>),
        (status = 404, description = "Issue not found")
    ),
    tag = "comments",
    security(("bearer_auth" = []))
)]
pub async fn list_comments(
    user: AuthenticatedUser,
    State(service): State<Arc<CommentService>>,
    Path(issue_id): Path<Uuid>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<CommentResponseDto>>>> {
    let (comments, total) = service.list(&user, issue_id, &pagination).await?;
    let items = comments.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(
        Some(items),
        None,
        Some(Meta::paginated(total, &pagination)),
    )))
}

/// Comment on an issue
#[utoipa::path(
    post,
    path = "/api/issues/{id}/comments",
    params(("id" = Uuid, Path, description = "Issue ID")),
    request_body = CreateCommentDto,
    responses(
        (status = 201, description = "Comment created", body = ApiResponse<CommentResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Internal comments require staff access"),
        (status = 404, description = "Issue not found")
    ),
    tag = "comments",
    security(("bearer_auth" = []))
)]
pub async fn create_comment(
    user: AuthenticatedUser,
    State(service): State<Arc<CommentService>>,
    Path(issue_id): Path<Uuid>,
    AppJson(dto): AppJson<CreateCommentDto>,
) -> Result<(StatusCode, Json<ApiResponse<CommentResponseDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let comment = service.create(&user, issue_id, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(comment.into()),
            Some("Comment added".to_string()),
            None,
        )),
    ))
}

/// Edit own comment
#[utoipa::path(
    patch,
    path = "/api/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment ID")),
    request_body = UpdateCommentDto,
    responses(
        (status = 200, description = "Comment updated", body = ApiResponse<CommentResponseDto>),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Comment not found")
    ),
    tag = "comments",
    security(("bearer_auth" = []))
)]
pub async fn update_comment(
    user: AuthenticatedUser,
    State(service): State<Arc<CommentService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<UpdateCommentDto>,
) -> Result<Json<ApiResponse<CommentResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let comment = service.update(&user, id, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(comment.into()),
        Some("Comment updated".to_string()),
        None,
    )))
}

/// Delete own comment
#[utoipa::path(
    delete,
    path = "/api/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Comment not found")
    ),
    tag = "comments",
    security(("bearer_auth" = []))
)]
pub async fn delete_comment(
    user: AuthenticatedUser,
    State(service): State<Arc<CommentService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete(&user, id).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Comment deleted".to_string()),
        None,
    )))
}
