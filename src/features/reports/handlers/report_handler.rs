use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::auth::guards::RequireStaff;
use crate::features::reports::dtos::{
    AnalyticsQuery, CreateReportDto, ExportQuery, MetricsDto, ReportFilterQuery,
    ReportResponseDto, ReportStatusDto,
};
use crate::features::reports::services::analytics::AnalyticsReport;
use crate::features::reports::services::ReportService;
use crate::shared::download::file_response;
use crate::shared::types::{ApiResponse, Meta, PaginationQuery};

/// Request a report
///
/// Returns immediately with status `pending`; poll `/api/reports/{id}/status`.
#[utoipa::path(
    post,
    path = "/api/reports",
    request_body = CreateReportDto,
    responses(
        (status = 201, description = "Report queued", body = ApiResponse<ReportResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Staff access required")
    ),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn create_report(
    RequireStaff(user): RequireStaff,
    State(service): State<Arc<ReportService>>,
    AppJson(dto): AppJson<CreateReportDto>,
) -> Result<(StatusCode, Json<ApiResponse<ReportResponseDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let report = service.create(&user, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(report.into()),
            Some("Report queued for generation".to_string()),
            None,
        )),
    ))
}

/// List reports
///
/// Staff see their own reports; managers and admins see all.
#[utoipa::path(
    get,
    path = "/api/reports",
    params(PaginationQuery, ReportFilterQuery),
    responses(
        (status = 200, description = "Reports", body = ApiResponse<Vec<ReportResponseDto>>),
        (status = 403, description = "Staff access required")
    ),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn list_reports(
    RequireStaff(user): RequireStaff,
    State(service): State<Arc<ReportService>>,
    Query(pagination): Query<PaginationQuery>,
    Query(filter): Query<ReportFilterQuery>,
) -> Result<Json<ApiResponse<Vec<ReportResponseDto>>>> {
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
    path = "/api/reports/{id}",
    params(("id" = Uuid, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report", body = ApiResponse<ReportResponseDto>),
        (status = 404, description = "Report not found")
    ),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn get_report(
    RequireStaff(user): RequireStaff,
    State(service): State<Arc<ReportService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ReportResponseDto>>> {
    let report = service.get(&user, id).await?;
    Ok(Json(ApiResponse::success(Some(report.into()), None, None)))
}

/// Poll generation status
#[utoipa::path(
    get,
    path = "/api/reports/{id}/status",
    params(("id" = Uuid, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Generation status", body = ApiResponse<ReportStatusDto>),
        (status = 404, description = "Report not found")
    ),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn get_report_status(
    RequireStaff(user): RequireStaff,
    State(service): State<Arc<ReportService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ReportStatusDto>>> {
    let report = service.get(&user, id).await?;
    Ok(Json(ApiResponse::success(
        Some(ReportStatusDto::from(&report)),
        None,
        None,
    )))
}

/// Download a generated report
#[utoipa::path(
    get,
    path = "/api/reports/{id}/download",
    params(("id" = Uuid, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report file", content_type = "application/octet-stream"),
        (status = 404, description = "Report not found"),
        (status = 409, description = "Report not generated yet")
    ),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn download_report(
    RequireStaff(user): RequireStaff,
    State(service): State<Arc<ReportService>>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let (report, data) = service.download(&user, id).await?;
    file_response(data, report.format.content_type(), &report.download_name())
}

#[utoipa::path(
    delete,
    path = "/api/reports/{id}",
    params(("id" = Uuid, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report deleted"),
        (status = 404, description = "Report not found")
    ),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn delete_report(
    RequireStaff(user): RequireStaff,
    State(service): State<Arc<ReportService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete(&user, id).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Report deleted".to_string()),
        None,
    )))
}

/// Analytics for a date range
///
/// Computed on request. An inverted range returns an empty result.
#[utoipa::path(
    get,
    path = "/api/reports/analytics",
    params(AnalyticsQuery),
    responses(
        (status = 200, description = "Analytics", body = ApiResponse<AnalyticsReport>),
        (status = 400, description = "Unknown status or priority"),
        (status = 403, description = "Staff access required")
    ),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn get_analytics(
    RequireStaff(_user): RequireStaff,
    State(service): State<Arc<ReportService>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<ApiResponse<AnalyticsReport>>> {
    let params = query.parameters()?;
    let analytics = service.analytics(&params).await?;
    Ok(Json(ApiResponse::success(Some(analytics), None, None)))
}

/// Real-time counts and last 24 hours of activity
#[utoipa::path(
    get,
    path = "/api/reports/metrics",
    responses(
        (status = 200, description = "Metrics", body = ApiResponse<MetricsDto>),
        (status = 403, description = "Staff access required")
    ),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn get_metrics(
    RequireStaff(_user): RequireStaff,
    State(service): State<Arc<ReportService>>,
) -> Result<Json<ApiResponse<MetricsDto>>> {
    let metrics = service.metrics().await?;
    Ok(Json(ApiResponse::success(Some(metrics), None, None)))
}

/// Quick CSV export of issues
#[utoipa::path(
    get,
    path = "/api/reports/export",
    params(AnalyticsQuery, ExportQuery),
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv"),
        (status = 400, description = "Unknown status or priority"),
        (status = 403, description = "Staff access required")
    ),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn export_issues(
    RequireStaff(_user): RequireStaff,
    State(service): State<Arc<ReportService>>,
    Query(query): Query<AnalyticsQuery>,
    Query(export): Query<ExportQuery>,
) -> Result<Response> {
    let params = query.parameters()?;
    let csv = service.export(&params, export.assignee_id).await?;
    let file_name = format!("export_issues_{}.csv", Utc::now().format("%Y%m%d_%H%M%S"));
    file_response(csv.into_bytes(), "text/csv; charset=utf-8", &file_name)
}
