use crate::features::comments::handlers;
use crate::features::comments::services::CommentService;
use axum::{
    routing::{get, patch},
    Router,
};
use std::sync::Arc;

pub fn routes(service: Arc<CommentService>) -> Router {
    Router::new()
        .route(
            "/api/issues/{id}/comments",
            get(handlers::list_comments).post(handlers::create_comment),
        )
        .route(
            "/api/comments/{id}",
            patch(handlers::update_comment).delete(handlers::delete_comment),
        )
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::issues::IssueService;
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
        let store = Arc::new(MemoryStore::new());
        let issues = Arc::new(IssueService::new(
            pool.clone(),
            Arc::new(UserService::new(pool.clone())),
            notifications.clone(),
            store.clone(),
        ));
        let service = Arc::new(CommentService::new(pool, issues, notifications, store));
        TestServer::new(with_user(routes(service), role)).unwrap()
    }

    #[tokio::test]
    async fn test_clients_cannot_post_internal_comments() {
        server(UserRole::Client)
            .post(&format!("/api/issues/{}/comments", Uuid::new_v4()))
            .json(&json!({ "content": "psst", "visibility": "internal" }))
            .await
            .assert_status_forbidden();
    }

    #[tokio::test]
    async fn test_empty_comment_is_rejected() {
        server(UserRole::Staff)
            .post(&format!("/api/issues/{}/comments", Uuid::new_v4()))
            .json(&json!({ "content": "" }))
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_unknown_visibility_is_rejected() {
        server(UserRole::Staff)
            .post(&format!("/api/issues/{}/comments", Uuid::new_v4()))
            .json(&json!({ "content": "hi", "visibility": "secret" }))
            .await
            .assert_status_bad_request();
    }
}
