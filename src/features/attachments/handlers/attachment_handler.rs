use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use tracing::debug;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::attachments::dtos::{
    AttachmentFilterQuery, AttachmentResponseDto, LinkAttachmentDto, UploadAttachmentDto,
};
use crate::features::attachments::models::AttachmentTarget;
use crate::features::attachments::services::{AttachmentService, UploadedFile};
use crate::features::auth::model::AuthenticatedUser;
use crate::shared::download::file_response;
use crate::shared::types::{ApiResponse, Meta, PaginationQuery};

fn parse_id_field(name: &str, text: &str) -> Result<Option<Uuid>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(text)
        .map(Some)
        .map_err(|_| AppError::BadRequest(format!("Invalid {}: '{}'", name, text)))
}

/// Body limit hits surface as 413, everything else as a malformed request
fn multipart_error(context: &str, e: MultipartError) -> AppError {
    debug!("{}: {}", context, e);
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Upload exceeds the maximum request size".to_string())
    } else {
        AppError::BadRequest(format!("{}: {}", context, e.body_text()))
    }
}

/// Upload an attachment
///
/// Accepts multipart/form-data with:
/// - `file`: the file (required)
/// - `issue_id`, `comment_id` or `feedback_id`: optional link, at most one
#[utoipa::path(
    post,
    path = "/api/attachments",
    tag = "attachments",
    request_body(
        content = UploadAttachmentDto,
        content_type = "multipart/form-data",
        description = "File with an optional issue, comment or feedback link",
    ),
    responses(
        (status = 201, description = "Attachment uploaded", body = ApiResponse<AttachmentResponseDto>),
        (status = 400, description = "Invalid file or link"),
        (status = 401, description = "Authentication required"),
        (status = 413, description = "File too large")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_attachment(
    user: AuthenticatedUser,
    State(service): State<Arc<AttachmentService>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<AttachmentResponseDto>>)> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut issue_id = None;
    let mut comment_id = None;
    let mut feedback_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Failed to read multipart data", e))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unnamed".to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error("Failed to read file data", e))?;
                file = Some((file_name, data.to_vec()));
            }
            "issue_id" | "comment_id" | "feedback_id" => {
                let text = field.text().await.map_err(|e| {
                    multipart_error(&format!("Failed to read {} field", field_name), e)
                })?;
                let id = parse_id_field(&field_name, &text)?;
                match field_name.as_str() {
                    "issue_id" => issue_id = id,
                    "comment_id" => comment_id = id,
                    _ => feedback_id = id,
                }
            }
            _ => {
                debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let (file_name, data) =
        file.ok_or_else(|| AppError::BadRequest("File is required".to_string()))?;
    let target = AttachmentTarget::from_ids(issue_id, comment_id, feedback_id)?;

    let attachment = service
        .upload(
            &user,
            UploadedFile {
                file_name,
                data,
                target,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(attachment.into()),
            Some("File uploaded successfully".to_string()),
            None,
        )),
    ))
}

/// List attachments
///
/// Staff see all attachments; other users see their own uploads.
#[utoipa::path(
    get,
    path = "/api/attachments",
    params(PaginationQuery, AttachmentFilterQuery),
    responses(
        (status = 200, description = "Attachments", body = ApiResponse<Vec<AttachmentResponseDto>>)
    ),
    tag = "attachments",
    security(("bearer_auth" = []))
)]
pub async fn list_attachments(
    user: AuthenticatedUser,
    State(service): State<Arc<AttachmentService>>,
    Query(pagination): Query<PaginationQuery>,
    Query(filter): Query<AttachmentFilterQuery>,
) -> Result<Json<ApiResponse<Vec<AttachmentResponseDto>>>> {
    let (items, total) = service.list(&user, &filter, &pagination).await?;
    let items = items.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(
        Some(items),
        None,
        Some(Meta::paginated(total, &pagination)),
    )))
}

#[utoipa::path(
    get,
    path = "/api/attachments/{id}",
    params(("id" = Uuid, Path, description = "Attachment ID")),
    responses(
        (status = 200, description = "Attachment", body = ApiResponse<AttachmentResponseDto>),
        (status = 403, description = "Not the uploader"),
        (status = 404, description = "Attachment not found")
    ),
    tag = "attachments",
    security(("bearer_auth" = []))
)]
pub async fn get_attachment(
    user: AuthenticatedUser,
    State(service): State<Arc<AttachmentService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<AttachmentResponseDto>>> {
    let attachment = service.get(&user, id).await?;
    Ok(Json(ApiResponse::success(Some(attachment.into()), None, None)))
}

/// Change what an attachment is linked to
#[utoipa::path(
    patch,
    path = "/api/attachments/{id}",
    params(("id" = Uuid, Path, description = "Attachment ID")),
    request_body = LinkAttachmentDto,
    responses(
        (status = 200, description = "Attachment relinked", body = ApiResponse<AttachmentResponseDto>),
        (status = 400, description = "More than one link given"),
        (status = 403, description = "Not the uploader"),
        (status = 404, description = "Attachment or target not found")
    ),
    tag = "attachments",
    security(("bearer_auth" = []))
)]
pub async fn link_attachment(
    user: AuthenticatedUser,
    State(service): State<Arc<AttachmentService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<LinkAttachmentDto>,
) -> Result<Json<ApiResponse<AttachmentResponseDto>>> {
    let target = AttachmentTarget::from_ids(dto.issue_id, dto.comment_id, dto.feedback_id)?;
    let attachment = service.link(&user, id, target).await?;
    Ok(Json(ApiResponse::success(
        Some(attachment.into()),
        Some("Attachment updated".to_string()),
        None,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/attachments/{id}",
    params(("id" = Uuid, Path, description = "Attachment ID")),
    responses(
        (status = 200, description = "Attachment deleted"),
        (status = 403, description = "Not the uploader"),
        (status = 404, description = "Attachment not found")
    ),
    tag = "attachments",
    security(("bearer_auth" = []))
)]
pub async fn delete_attachment(
    user: AuthenticatedUser,
    State(service): State<Arc<AttachmentService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete(&user, id).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Attachment deleted".to_string()),
        None,
    )))
}

/// Download the stored file
#[utoipa::path(
    get,
    path = "/api/attachments/{id}/download",
    params(("id" = Uuid, Path, description = "Attachment ID")),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 403, description = "Not the uploader"),
        (status = 404, description = "Attachment not found"),
        (status = 500, description = "Stored file failed its integrity check")
    ),
    tag = "attachments",
    security(("bearer_auth" = []))
)]
pub async fn download_attachment(
    user: AuthenticatedUser,
    State(service): State<Arc<AttachmentService>>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let (attachment, data) = service.download(&user, id).await?;
    file_response(data, &attachment.content_type, &attachment.original_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_field() {
        assert_eq!(parse_id_field("issue_id", "  ").unwrap(), None);
        let id = Uuid::new_v4();
        assert_eq!(parse_id_field("issue_id", &id.to_string()).unwrap(), Some(id));
        assert!(matches!(
            parse_id_field("issue_id", "abc"),
            Err(AppError::BadRequest(_))
        ));
    }
}
