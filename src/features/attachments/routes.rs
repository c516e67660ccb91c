use crate::features::attachments::handlers;
use crate::features::attachments::services::AttachmentService;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create routes for the attachments feature
pub fn routes(service: Arc<AttachmentService>) -> Router {
    // Room for multipart overhead on top of the file itself
    let body_limit = service.max_size() + 1024 * 1024;

    Router::new()
        .route(
            "/api/attachments",
            post(handlers::upload_attachment)
                .layer(DefaultBodyLimit::max(body_limit))
                .get(handlers::list_attachments),
        )
        .route(
            "/api/attachments/{id}",
            get(handlers::get_attachment)
                .patch(handlers::link_attachment)
                .delete(handlers::delete_attachment),
        )
        .route(
            "/api/attachments/{id}/download",
            get(handlers::download_attachment),
        )
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::feedback::FeedbackService;
    use crate::features::issues::IssueService;
    use crate::features::notifications::NotificationService;
    use crate::features::users::models::UserRole;
    use crate::features::users::UserService;
    use crate::modules::email::{EmailQueue, LogMailer};
    use crate::modules::storage::{BlobStore, MemoryStore};
    use crate::shared::constants::MAX_ATTACHMENT_SIZE;
    use crate::shared::test_helpers::{lazy_pool, with_user};
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use uuid::Uuid;

    fn router() -> Router {
        router_with_limit(MAX_ATTACHMENT_SIZE)
    }

    fn router_with_limit(max_size: usize) -> Router {
        let pool = lazy_pool();
        let (emails, _) = EmailQueue::start(Arc::new(LogMailer), 1);
        let users = Arc::new(UserService::new(pool.clone()));
        let notifications = Arc::new(NotificationService::new(
            pool.clone(),
            emails,
            "http://localhost:3000".into(),
        ));
        let store: Arc<dyn BlobStore> = Arc::new(MemoryStore::new());
        let issues = Arc::new(IssueService::new(
            pool.clone(),
            users.clone(),
            notifications.clone(),
            store.clone(),
        ));
        let feedback = Arc::new(FeedbackService::new(
            pool.clone(),
            users,
            notifications,
            store.clone(),
        ));
        routes(Arc::new(AttachmentService::new(
            pool,
            store,
            issues,
            feedback,
            "attachments".into(),
            max_size,
        )))
    }

    fn file(name: &str, data: &'static [u8]) -> Part {
        Part::bytes(data).file_name(name)
    }

    #[tokio::test]
    async fn test_upload_requires_authentication() {
        let form = MultipartForm::new().add_part("file", file("notes.txt", b"hello"));
        TestServer::new(router())
            .unwrap()
            .post("/api/attachments")
            .multipart(form)
            .await
            .assert_status_unauthorized();
    }

    #[tokio::test]
    async fn test_disallowed_extension_is_rejected() {
        let form = MultipartForm::new().add_part("file", file("setup.exe", b"MZ"));
        let response = TestServer::new(with_user(router(), UserRole::Client))
            .unwrap()
            .post("/api/attachments")
            .multipart(form)
            .await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert!(body["message"].as_str().unwrap().contains("not allowed"));
    }

    #[tokio::test]
    async fn test_body_over_limit_is_payload_too_large() {
        // Past max_size plus the multipart allowance, so the body limit trips
        // before the size check in the service
        let data = vec![b'a'; 2 * 1024 * 1024];
        let form =
            MultipartForm::new().add_part("file", Part::bytes(data).file_name("dump.txt"));
        let response = TestServer::new(with_user(router_with_limit(1024), UserRole::Staff))
            .unwrap()
            .post("/api/attachments")
            .multipart(form)
            .await;
        response.assert_status(axum::http::StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_missing_file_is_rejected() {
        let form = MultipartForm::new().add_text("issue_id", Uuid::new_v4().to_string());
        TestServer::new(with_user(router(), UserRole::Client))
            .unwrap()
            .post("/api/attachments")
            .multipart(form)
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_two_links_are_rejected() {
        let form = MultipartForm::new()
            .add_part("file", file("notes.txt", b"hello"))
            .add_text("issue_id", Uuid::new_v4().to_string())
            .add_text("feedback_id", Uuid::new_v4().to_string());
        TestServer::new(with_user(router(), UserRole::Staff))
            .unwrap()
            .post("/api/attachments")
            .multipart(form)
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_relink_to_two_targets_is_rejected() {
        TestServer::new(with_user(router(), UserRole::Client))
            .unwrap()
            .patch(&format!("/api/attachments/{}", Uuid::new_v4()))
            .json(&serde_json::json!({
                "issue_id": Uuid::new_v4(),
                "comment_id": Uuid::new_v4()
            }))
            .await
            .assert_status_bad_request();
    }
}
