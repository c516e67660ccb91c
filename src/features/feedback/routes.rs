use crate::features::feedback::handlers;
use crate::features::feedback::services::FeedbackService;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Mounted behind the optional auth layer: submission is public, every other
/// handler demands a user through its extractor.
pub fn routes(service: Arc<FeedbackService>) -> Router {
    Router::new()
        .route(
            "/api/feedback",
            get(handlers::list_feedback).post(handlers::create_feedback),
        )
        .route("/api/feedback/my", get(handlers::my_feedback))
        .route(
            "/api/feedback/{id}",
            get(handlers::get_feedback)
                .patch(handlers::update_feedback)
                .delete(handlers::delete_feedback),
        )
        .route(
            "/api/feedback/{id}/acknowledge",
            post(handlers::acknowledge_feedback),
        )
        .route("/api/feedback/{id}/close", post(handlers::close_feedback))
        .route(
            "/api/feedback/{id}/convert",
            post(handlers::convert_feedback),
        )
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
    use fake::faker::internet::en::FreeEmail;
    use fake::Fake;
    use serde_json::json;
    use uuid::Uuid;

    fn router() -> Router {
        let pool = lazy_pool();
        let (emails, _) = EmailQueue::start(Arc::new(LogMailer), 1);
        let notifications = Arc::new(NotificationService::new(
            pool.clone(),
            emails,
            "http://localhost:3000".into(),
        ));
        let service = Arc::new(FeedbackService::new(
            pool.clone(),
            Arc::new(UserService::new(pool)),
            notifications,
            Arc::new(MemoryStore::new()),
        ));
        routes(service)
    }

    #[tokio::test]
    async fn test_anonymous_submission_is_validated() {
        let email: String = FreeEmail().fake();
        let server = TestServer::new(router()).unwrap();
        server
            .post("/api/feedback")
            .json(&json!({ "title": "", "description": "d", "email": email }))
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_anonymous_cannot_list_own_feedback() {
        TestServer::new(router())
            .unwrap()
            .get("/api/feedback/my")
            .await
            .assert_status_unauthorized();
    }

    #[tokio::test]
    async fn test_clients_cannot_list_all_feedback() {
        TestServer::new(with_user(router(), UserRole::Client))
            .unwrap()
            .get("/api/feedback")
            .await
            .assert_status_forbidden();
    }

    #[tokio::test]
    async fn test_clients_cannot_convert() {
        TestServer::new(with_user(router(), UserRole::Client))
            .unwrap()
            .post(&format!("/api/feedback/{}/convert", Uuid::new_v4()))
            .json(&json!({}))
            .await
            .assert_status_forbidden();
    }

    #[tokio::test]
    async fn test_staff_cannot_delete() {
        TestServer::new(with_user(router(), UserRole::Staff))
            .unwrap()
            .delete(&format!("/api/feedback/{}", Uuid::new_v4()))
            .await
            .assert_status_forbidden();
    }
}
