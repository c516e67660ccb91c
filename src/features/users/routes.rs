use crate::features::users::handlers;
use crate::features::users::services::UserService;
use axum::{routing::get, Router};
use std::sync::Arc;

pub fn routes(service: Arc<UserService>) -> Router {
    Router::new()
        .route(
            "/api/users/me",
            get(handlers::get_profile).patch(handlers::update_profile),
        )
        .route("/api/users/staff", get(handlers::list_staff))
        .route("/api/users", get(handlers::list_users))
        .route(
            "/api/users/{id}",
            get(handlers::get_user)
                .patch(handlers::update_user)
                .delete(handlers::deactivate_user),
        )
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::users::models::UserRole;
    use crate::shared::test_helpers::{lazy_pool, with_user};
    use axum_test::TestServer;

    fn server(role: UserRole) -> TestServer {
        let service = Arc::new(UserService::new(lazy_pool()));
        TestServer::new(with_user(routes(service), role)).unwrap()
    }

    #[tokio::test]
    async fn test_clients_cannot_list_users() {
        server(UserRole::Client)
            .get("/api/users")
            .await
            .assert_status_forbidden();
    }

    #[tokio::test]
    async fn test_staff_cannot_list_users() {
        server(UserRole::Staff)
            .get("/api/users")
            .await
            .assert_status_forbidden();
    }

    #[tokio::test]
    async fn test_clients_cannot_list_staff() {
        server(UserRole::Client)
            .get("/api/users/staff")
            .await
            .assert_status_forbidden();
    }

    #[tokio::test]
    async fn test_managers_cannot_change_roles() {
        server(UserRole::Manager)
            .patch(&format!("/api/users/{}", uuid::Uuid::new_v4()))
            .json(&serde_json::json!({ "role": "admin" }))
            .await
            .assert_status_forbidden();
    }

    #[tokio::test]
    async fn test_invalid_profile_name_is_rejected() {
        server(UserRole::Client)
            .patch("/api/users/me")
            .json(&serde_json::json!({ "first_name": "<b>" }))
            .await
            .assert_status_bad_request();
    }
}
