use crate::features::issues::handlers;
use crate::features::issues::services::IssueService;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn routes(service: Arc<IssueService>) -> Router {
    Router::new()
        .route(
            "/api/issues",
            get(handlers::list_issues).post(handlers::create_issue),
        )
        .route(
            "/api/issues/{id}",
            get(handlers::get_issue)
                .patch(handlers::update_issue)
                .delete(handlers::delete_issue),
        )
        .route("/api/issues/{id}/assign", post(handlers::assign_issue))
        .route(
            "/api/issues/{id}/transition",
            post(handlers::transition_issue),
        )
        .route("/api/issues/{id}/history", get(handlers::get_issue_history))
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::notifications::NotificationService;
    use crate::features::users::models::UserRole;
    use crate::features::users::UserService;
    use crate::modules::email::{EmailQueue, LogMailer};
    use crate::modules::storage::MemoryStore;
    use crate::shared::test_helpers::{lazy_pool, with_user};
    use axum_test::TestServer;
    use serde_json::json;
    use uuid::Uuid;

    fn server(role: UserRole) -> TestServer {
        let pool = lazy_pool();
        let (emails, _) = EmailQueue::start(Arc::new(LogMailer), 1);
        let notifications = Arc::new(NotificationService::new(
            pool.clone(),
            emails,
            "http://localhost:3000".into(),
        ));
        let service = Arc::new(IssueService::new(
            pool.clone(),
            Arc::new(UserService::new(pool)),
            notifications,
            Arc::new(MemoryStore::new()),
        ));
        TestServer::new(with_user(routes(service), role)).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_status_lists_allowed_values() {
        let response = server(UserRole::Staff)
            .post(&format!("/api/issues/{}/transition", Uuid::new_v4()))
            .json(&json!({ "new_status": "done" }))
            .await;

        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        let message = body["message"].as_str().unwrap_or_default();
        assert!(message.contains("open, in_progress, resolved, closed, reopen"));
    }

    #[tokio::test]
    async fn test_clients_cannot_transition() {
        server(UserRole::Client)
            .post(&format!("/api/issues/{}/transition", Uuid::new_v4()))
            .json(&json!({ "new_status": "closed" }))
            .await
            .assert_status_forbidden();
    }

    #[tokio::test]
    async fn test_clients_cannot_assign() {
        server(UserRole::Client)
            .post(&format!("/api/issues/{}/assign", Uuid::new_v4()))
            .json(&json!({ "assignee_id": Uuid::new_v4() }))
            .await
            .assert_status_forbidden();
    }

    #[tokio::test]
    async fn test_staff_cannot_delete() {
        server(UserRole::Staff)
            .delete(&format!("/api/issues/{}", Uuid::new_v4()))
            .await
            .assert_status_forbidden();
    }

    #[tokio::test]
    async fn test_create_rejects_empty_title() {
        server(UserRole::Client)
            .post("/api/issues")
            .json(&json!({ "title": "", "description": "Broken" }))
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_unknown_filter_value_is_rejected() {
        server(UserRole::Manager)
            .get("/api/issues?priority=urgent")
            .await
            .assert_status_bad_request();
    }
}
