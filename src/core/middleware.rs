use crate::core::error::AppError;
use crate::features::auth::TokenService;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use base64::prelude::*;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::Span;
use uuid::Uuid;

/// Request ID generator using UUID v7 (time-ordered)
#[derive(Clone, Copy)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Custom MakeSpan that includes request_id in the tracing span
#[derive(Clone, Debug)]
pub struct MakeSpanWithRequestId;

impl<B> tower_http::trace::MakeSpan<B> for MakeSpanWithRequestId {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

pub fn cors_layer(allowed_origins: Vec<String>) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    // If origins list contains "*", allow any origin
    if allowed_origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        // Parse origins into HeaderValue
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn basic_auth_middleware(
    valid_credentials: Arc<String>,
) -> impl Fn(
    Request,
    Next,
)
    -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, Response>> + Send>>
       + Clone {
    move |req: Request, next: Next| {
        let credentials = valid_credentials.clone();
        Box::pin(async move {
            let auth_header = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|header| header.to_str().ok());

            if let Some(auth_header) = auth_header {
                if let Some(encoded) = auth_header.strip_prefix("Basic ") {
                    if let Ok(decoded) = BASE64_STANDARD.decode(encoded) {
                        if let Ok(creds) = String::from_utf8(decoded) {
                            if creds == *credentials {
                                return Ok(next.run(req).await);
                            }
                        }
                    }
                }
            }

            let mut response = Response::new(Body::from("Unauthorized"));
            *response.status_mut() = StatusCode::UNAUTHORIZED;
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"Swagger UI\""),
            );

            Err(response)
        })
    }
}

fn bearer_token(req: &Request) -> Result<Option<&str>, AppError> {
    let Some(auth_header) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    else {
        return Ok(None);
    };

    auth_header
        .strip_prefix("Bearer ")
        .map(|token| Some(token.trim()))
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".to_string()))
}

/// Requires a valid access token and inserts the `AuthenticatedUser` into request extensions
pub async fn auth_middleware(
    State(tokens): State<Arc<TokenService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req)?
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    let user = tokens.validate_access_token(token)?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Like `auth_middleware` but lets anonymous requests through.
/// A token that is present but invalid is still rejected.
pub async fn optional_auth_middleware(
    State(tokens): State<Arc<TokenService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(token) = bearer_token(&req)? {
        let user = tokens.validate_access_token(token)?;
        req.extensions_mut().insert(user);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::JwtConfig;
    use crate::features::auth::model::AuthenticatedUser;
    use axum::{routing::get, Extension, Router};
    use axum_test::TestServer;
    use std::time::Duration;

    fn token_service() -> Arc<TokenService> {
        Arc::new(TokenService::new(&JwtConfig {
            secret: "middleware-test-secret-with-enough-length".to_string(),
            access_token_ttl: Duration::from_secs(900),
            refresh_token_ttl: Duration::from_secs(3600),
            leeway_secs: 0,
        }))
    }

    async fn whoami(user: Option<Extension<AuthenticatedUser>>) -> String {
        user.map(|Extension(u)| u.email)
            .unwrap_or_else(|| "anonymous".to_string())
    }

    fn app(optional: bool) -> Router {
        let tokens = token_service();
        let router = Router::new().route("/whoami", get(whoami));
        if optional {
            router.layer(axum::middleware::from_fn_with_state(
                tokens,
                optional_auth_middleware,
            ))
        } else {
            router.layer(axum::middleware::from_fn_with_state(tokens, auth_middleware))
        }
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let server = TestServer::new(app(false)).unwrap();
        let response = server.get("/whoami").await;
        response.assert_status_unauthorized();
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_is_unauthorized() {
        let server = TestServer::new(app(false)).unwrap();
        let response = server
            .get("/whoami")
            .add_header(header::AUTHORIZATION, "Basic abc")
            .await;
        response.assert_status_unauthorized();
    }

    #[tokio::test]
    async fn test_invalid_token_is_unauthorized() {
        let server = TestServer::new(app(false)).unwrap();
        let response = server
            .get("/whoami")
            .authorization_bearer("garbage")
            .await;
        response.assert_status_unauthorized();
    }

    #[tokio::test]
    async fn test_optional_auth_allows_anonymous() {
        let server = TestServer::new(app(true)).unwrap();
        let response = server.get("/whoami").await;
        response.assert_status_ok();
        response.assert_text("anonymous");
    }

    #[tokio::test]
    async fn test_basic_auth_rejects_wrong_credentials() {
        let router = Router::new()
            .route("/docs", get(|| async { "docs" }))
            .layer(axum::middleware::from_fn(basic_auth_middleware(Arc::new(
                "docs:secret".to_string(),
            ))));
        let server = TestServer::new(router).unwrap();

        server
            .get("/docs")
            .add_header(header::AUTHORIZATION, format!("Basic {}", BASE64_STANDARD.encode("docs:nope")))
            .await
            .assert_status_unauthorized();

        server
            .get("/docs")
            .add_header(header::AUTHORIZATION, format!("Basic {}", BASE64_STANDARD.encode("docs:secret")))
            .await
            .assert_status_ok();
    }
}
