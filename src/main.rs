mod core;
mod features;
mod modules;
mod shared;

use crate::core::config::{Config, StorageBackend};
use crate::core::openapi::{ApiDoc, SwaggerInfoModifier};
use crate::core::{database, middleware};
use crate::features::attachments::{routes as attachments_routes, AttachmentService};
use crate::features::auth::routes as auth_routes;
use crate::features::auth::{AuthService, TokenService};
use crate::features::comments::{routes as comments_routes, CommentService};
use crate::features::feedback::{routes as feedback_routes, FeedbackService};
use crate::features::issues::{routes as issues_routes, IssueService};
use crate::features::notifications::{routes as notifications_routes, NotificationService};
use crate::features::reports::{
    routes as reports_routes, AnalyticsService, ReportService, ReportWorker,
};
use crate::features::users::{routes as users_routes, UserService};
use crate::modules::email::{EmailQueue, LogMailer, Mailer, SmtpMailer};
use crate::modules::storage::{BlobStore, MemoryStore, MinIOStore};
use axum::{middleware::from_fn, Router};
use std::sync::Arc;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Default email queue depth when SMTP is not configured
const LOG_MAILER_QUEUE_CAPACITY: usize = 64;

fn main() -> anyhow::Result<()> {
    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(worker_threads * 4)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(worker_threads))
}

async fn async_main(worker_threads: usize) -> anyhow::Result<()> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        "System info: available_cpus={}, tokio_worker_threads={}, pid={}",
        std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(1),
        worker_threads,
        std::process::id()
    );
    tracing::info!("Configuration loaded successfully");

    let pool = database::create_pool(&config.database).await?;
    tracing::info!("Database connection pool created");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
    tracing::info!("Database migrations completed successfully");

    // Object storage for attachments and report files
    let store: Arc<dyn BlobStore> = match config.storage.backend {
        StorageBackend::MinIO => {
            let minio = MinIOStore::new(&config.storage)
                .map_err(|e| anyhow::anyhow!("Failed to initialize MinIO client: {}", e))?;
            minio
                .ensure_bucket_exists()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to ensure MinIO bucket exists: {}", e))?;
            tracing::info!("MinIO store initialized for bucket: {}", minio.bucket_name());
            Arc::new(minio)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; files are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Outbound email
    let (mailer, queue_capacity): (Arc<dyn Mailer>, usize) = match &config.email {
        Some(email) => {
            let smtp = SmtpMailer::new(email)
                .map_err(|e| anyhow::anyhow!("Failed to initialize SMTP mailer: {}", e))?;
            tracing::info!("SMTP mailer initialized ({})", email.smtp_host);
            (Arc::new(smtp), email.queue_capacity)
        }
        None => {
            tracing::info!("SMTP_HOST not set; notification emails will only be logged");
            (Arc::new(LogMailer), LOG_MAILER_QUEUE_CAPACITY)
        }
    };
    let (email_queue, _email_worker) = EmailQueue::start(mailer, queue_capacity);

    // Services
    let user_service = Arc::new(UserService::new(pool.clone()));
    let token_service = Arc::new(TokenService::new(&config.jwt));
    let auth_service = Arc::new(AuthService::new(
        pool.clone(),
        Arc::clone(&user_service),
        Arc::clone(&token_service),
    ));
    let notification_service = Arc::new(NotificationService::new(
        pool.clone(),
        email_queue,
        config.app.frontend_url.clone(),
    ));
    let issue_service = Arc::new(IssueService::new(
        pool.clone(),
        Arc::clone(&user_service),
        Arc::clone(&notification_service),
        Arc::clone(&store),
    ));
    let comment_service = Arc::new(CommentService::new(
        pool.clone(),
        Arc::clone(&issue_service),
        Arc::clone(&notification_service),
        Arc::clone(&store),
    ));
    let feedback_service = Arc::new(FeedbackService::new(
        pool.clone(),
        Arc::clone(&user_service),
        Arc::clone(&notification_service),
        Arc::clone(&store),
    ));
    let attachment_service = Arc::new(AttachmentService::new(
        pool.clone(),
        Arc::clone(&store),
        Arc::clone(&issue_service),
        Arc::clone(&feedback_service),
        config.storage.attachments_prefix.clone(),
        config.app.max_upload_size,
    ));
    let analytics_service = Arc::new(AnalyticsService::new(pool.clone()));
    let report_service = Arc::new(ReportService::new(
        pool.clone(),
        Arc::clone(&store),
        Arc::clone(&analytics_service),
    ));
    tracing::info!("Services initialized");

    // Background report generation
    let report_worker = ReportWorker::new(
        pool.clone(),
        Arc::clone(&analytics_service),
        Arc::clone(&store),
        config.storage.reports_prefix.clone(),
        config.worker.clone(),
    );
    tokio::spawn(async move {
        report_worker.run().await;
    });
    tracing::info!("Report worker spawned");

    // Build application router with dynamic swagger config
    let swagger_modifier = SwaggerInfoModifier {
        title: config.swagger.title.clone(),
        version: config.swagger.version.clone(),
        description: config.swagger.description.clone(),
    };

    let mut openapi = ApiDoc::openapi();
    swagger_modifier.modify(&mut openapi);

    let swagger = if let Some(credentials) = config.swagger.credentials() {
        tracing::info!("Swagger UI basic auth enabled");
        Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
            .layer(from_fn(middleware::basic_auth_middleware(Arc::new(
                credentials,
            ))))
    } else {
        tracing::info!("Swagger UI basic auth disabled (no credentials configured)");
        Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
    };

    // Protected routes (require a valid access token)
    let protected_routes = Router::new()
        .merge(auth_routes::protected_routes(Arc::clone(&auth_service)))
        .merge(users_routes::routes(user_service))
        .merge(issues_routes::routes(issue_service))
        .merge(comments_routes::routes(comment_service))
        .merge(attachments_routes::routes(attachment_service))
        .merge(notifications_routes::routes(notification_service))
        .merge(reports_routes::routes(report_service))
        .route_layer(axum::middleware::from_fn_with_state(
            Arc::clone(&token_service),
            middleware::auth_middleware,
        ));

    // Anonymous submission allowed; a bearer token attaches the user
    let optional_auth_routes = feedback_routes::routes(feedback_service).route_layer(
        axum::middleware::from_fn_with_state(
            Arc::clone(&token_service),
            middleware::optional_auth_middleware,
        ),
    );

    // Health check (no auth required); 503 while the database is unreachable
    async fn health_check(
        axum::extract::State(pool): axum::extract::State<sqlx::PgPool>,
    ) -> axum::http::StatusCode {
        if database::ping(&pool).await {
            axum::http::StatusCode::OK
        } else {
            axum::http::StatusCode::SERVICE_UNAVAILABLE
        }
    }
    let health_route = Router::new()
        .route("/health", axum::routing::get(health_check))
        .with_state(pool.clone());

    let public_routes = Router::new().merge(auth_routes::public_routes(auth_service));

    let app = Router::new()
        .merge(swagger)
        .merge(protected_routes)
        .merge(optional_auth_routes)
        .merge(public_routes)
        .merge(health_route)
        .layer(middleware::cors_layer(
            config.app.cors_allowed_origins.clone(),
        ))
        // Propagate X-Request-Id to response headers
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::MakeSpanWithRequestId)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Generate X-Request-Id using UUID v7 (or use client-provided one)
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid));

    let addr = config.app.server_address();
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    let socket = socket2::Socket::new(
        socket2::Domain::for_address(socket_addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nodelay(true)?;

    #[cfg(target_os = "linux")]
    {
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(std::time::Duration::from_secs(60))
            .with_interval(std::time::Duration::from_secs(10))
            .with_retries(3);
        socket.set_tcp_keepalive(&keepalive)?;
    }
    #[cfg(not(target_os = "linux"))]
    {
        let keepalive = socket2::TcpKeepalive::new().with_time(std::time::Duration::from_secs(60));
        socket.set_tcp_keepalive(&keepalive)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(config.app.listen_backlog)?;

    let listener = tokio::net::TcpListener::from_std(socket.into())?;
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
