use crate::features::reports::handlers;
use crate::features::reports::services::ReportService;
use axum::{routing::get, Router};
use std::sync::Arc;

/// Create routes for the reports feature
pub fn routes(service: Arc<ReportService>) -> Router {
    Router::new()
        .route(
            "/api/reports",
            get(handlers::list_reports).post(handlers::create_report),
        )
        .route("/api/reports/analytics", get(handlers::get_analytics))
        .route("/api/reports/metrics", get(handlers::get_metrics))
        .route("/api/reports/export", get(handlers::export_issues))
        .route(
            "/api/reports/{id}",
            get(handlers::get_report).delete(handlers::delete_report),
        )
        .route("/api/reports/{id}/status", get(handlers::get_report_status))
        .route("/api/reports/{id}/download", get(handlers::download_report))
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reports::services::AnalyticsService;
    use crate::features::users::models::UserRole;
    use crate::modules::storage::MemoryStore;
    use crate::shared::test_helpers::{lazy_pool, with_user};
    use axum_test::TestServer;
    use serde_json::json;
    use uuid::Uuid;

    fn router() -> Router {
        let pool = lazy_pool();
        let analytics = Arc::new(AnalyticsService::new(pool.clone()));
        routes(Arc::new(ReportService::new(
            pool,
            Arc::new(MemoryStore::new()),
            analytics,
        )))
    }

    #[tokio::test]
    async fn test_clients_cannot_use_reports() {
        let server = TestServer::new(with_user(router(), UserRole::Client)).unwrap();
        server.get("/api/reports").await.assert_status_forbidden();
        server.get("/api/reports/metrics").await.assert_status_forbidden();
        server
            .get(&format!("/api/reports/{}/download", Uuid::new_v4()))
            .await
            .assert_status_forbidden();
    }

    #[tokio::test]
    async fn test_unknown_report_type_is_rejected() {
        TestServer::new(with_user(router(), UserRole::Staff))
            .unwrap()
            .post("/api/reports")
            .json(&json!({ "report_type": "revenue", "format": "csv" }))
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_analytics_rejects_unknown_status_filter() {
        let response = TestServer::new(with_user(router(), UserRole::Manager))
            .unwrap()
            .get("/api/reports/analytics")
            .add_query_param("status", "open,archived")
            .await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("Invalid status 'archived'"));
    }

    #[tokio::test]
    async fn test_export_rejects_unknown_priority() {
        TestServer::new(with_user(router(), UserRole::Staff))
            .unwrap()
            .get("/api/reports/export")
            .add_query_param("priority", "urgent")
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_reports_require_authentication() {
        TestServer::new(router())
            .unwrap()
            .get("/api/reports/analytics")
            .await
            .assert_status_unauthorized();
    }
}
