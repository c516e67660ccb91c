use crate::features::notifications::handlers;
use crate::features::notifications::services::NotificationService;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

pub fn routes(service: Arc<NotificationService>) -> Router {
    Router::new()
        .route("/api/notifications", get(handlers::list_notifications))
        .route(
            "/api/notifications/unread-count",
            get(handlers::unread_count),
        )
        .route("/api/notifications/read-all", post(handlers::mark_all_read))
        .route("/api/notifications/{id}/read", post(handlers::mark_read))
        .route(
            "/api/notifications/{id}",
            delete(handlers::delete_notification),
        )
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::users::models::UserRole;
    use crate::modules::email::{EmailQueue, LogMailer};
    use crate::shared::test_helpers::{lazy_pool, with_user};
    use axum_test::TestServer;

    fn service() -> Arc<NotificationService> {
        let (emails, _) = EmailQueue::start(Arc::new(LogMailer), 1);
        Arc::new(NotificationService::new(
            lazy_pool(),
            emails,
            "http://localhost:3000".into(),
        ))
    }

    #[tokio::test]
    async fn test_requires_authenticated_user() {
        TestServer::new(routes(service()))
            .unwrap()
            .get("/api/notifications")
            .await
            .assert_status_unauthorized();
    }

    #[tokio::test]
    async fn test_malformed_id_is_rejected() {
        TestServer::new(with_user(routes(service()), UserRole::Client))
            .unwrap()
            .post("/api/notifications/not-a-uuid/read")
            .await
            .assert_status_bad_request();
    }
}
