use axum::{
    body::Body,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;

use crate::core::error::AppError;
use crate::features::auth::model::AuthenticatedUser;

/// JSON body extractor whose rejections use the API error envelope
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppJsonRejection;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| Self(value))
            .map_err(AppJsonRejection)
    }
}

pub struct AppJsonRejection(JsonRejection);

impl From<AppJsonRejection> for AppError {
    fn from(rejection: AppJsonRejection) -> Self {
        match rejection.0 {
            // Well-formed JSON with a wrong shape, e.g. an unknown enum value
            JsonRejection::JsonDataError(err) => AppError::Validation(err.body_text()),
            JsonRejection::JsonSyntaxError(err) => {
                AppError::BadRequest(format!("Invalid JSON syntax: {}", err.body_text()))
            }
            JsonRejection::MissingJsonContentType(_) => AppError::BadRequest(
                "Expected request with `Content-Type: application/json`".to_string(),
            ),
            other if other.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                AppError::PayloadTooLarge("Request body is too large".to_string())
            }
            other => AppError::BadRequest(format!("Failed to read JSON body: {}", other.body_text())),
        }
    }
}

impl IntoResponse for AppJsonRejection {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

/// Reads the user placed in request extensions by the auth middleware
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Router};
    use axum_test::TestServer;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Payload {
        title: String,
    }

    async fn echo(AppJson(payload): AppJson<Payload>) -> String {
        payload.title
    }

    async fn whoami(user: AuthenticatedUser) -> String {
        user.email
    }

    #[tokio::test]
    async fn test_json_syntax_error_is_bad_request() {
        let server = TestServer::new(Router::new().route("/echo", post(echo))).unwrap();
        let response = server
            .post("/echo")
            .content_type("application/json")
            .text("{not json")
            .await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_valid_json_passes_through() {
        let server = TestServer::new(Router::new().route("/echo", post(echo))).unwrap();
        let response = server
            .post("/echo")
            .json(&serde_json::json!({ "title": "hello" }))
            .await;
        response.assert_text("hello");
    }

    #[tokio::test]
    async fn test_wrong_field_type_is_validation_error() {
        let server = TestServer::new(Router::new().route("/echo", post(echo))).unwrap();
        let response = server
            .post("/echo")
            .json(&serde_json::json!({ "title": 42 }))
            .await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert!(body["message"].as_str().unwrap().contains("title"));
    }

    #[tokio::test]
    async fn test_authenticated_user_required() {
        let server = TestServer::new(Router::new().route("/me", post(whoami))).unwrap();
        server.post("/me").await.assert_status_unauthorized();
    }
}
