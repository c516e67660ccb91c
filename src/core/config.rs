use crate::shared::constants::MAX_ATTACHMENT_SIZE;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub swagger: SwaggerConfig,
    pub storage: StorageConfig,
    pub email: Option<EmailConfig>,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub max_upload_size: usize,
    pub frontend_url: String,
    pub listen_backlog: i32,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

/// Signing and lifetime settings for access and refresh tokens
#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub leeway_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub version: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    MinIO,
    /// In-process storage for local development
    Memory,
}

/// MinIO/S3 storage configuration for attachments and generated reports
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// MinIO/S3 endpoint URL
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// AWS region (for S3 compatibility)
    pub region: String,
    /// Key prefix for uploaded attachments
    pub attachments_prefix: String,
    /// Key prefix for generated report files
    pub reports_prefix: String,
}

/// SMTP settings. Absent when `SMTP_HOST` is not set, in which case
/// notification emails are only logged.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from_address: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub queue_capacity: usize,
}

/// Background report worker tuning
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub batch_size: i64,
    pub max_retries: i32,
    pub retry_backoff: Duration,
    pub failed_retention_days: i64,
    /// A `processing` row untouched for longer than this is reclaimed
    pub processing_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            app: AppConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            jwt: JwtConfig::from_env()?,
            swagger: SwaggerConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            email: EmailConfig::from_env()?,
            worker: WorkerConfig::from_env()?,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid number", key)),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    const DEFAULT_MAX_UPLOAD_SIZE: usize = MAX_ATTACHMENT_SIZE;
    const DEFAULT_LISTEN_BACKLOG: i32 = 1024;

    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        // Comma-separated list, "*" allows any origin
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_upload_size = parse_env("MAX_UPLOAD_SIZE", Self::DEFAULT_MAX_UPLOAD_SIZE)?;

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
            max_upload_size,
            frontend_url,
            listen_backlog: parse_env("LISTEN_BACKLOG", Self::DEFAULT_LISTEN_BACKLOG)?,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        Ok(Self {
            url,
            max_connections: parse_env("DB_MAX_CONNECTIONS", Self::DEFAULT_MAX_CONNECTIONS)?,
            min_connections: parse_env("DB_MIN_CONNECTIONS", Self::DEFAULT_MIN_CONNECTIONS)?,
            acquire_timeout_secs: parse_env(
                "DB_ACQUIRE_TIMEOUT_SECS",
                Self::DEFAULT_ACQUIRE_TIMEOUT_SECS,
            )?,
            idle_timeout_secs: parse_env("DB_IDLE_TIMEOUT_SECS", Self::DEFAULT_IDLE_TIMEOUT_SECS)?,
            max_lifetime_secs: parse_env("DB_MAX_LIFETIME_SECS", Self::DEFAULT_MAX_LIFETIME_SECS)?,
        })
    }
}

impl JwtConfig {
    const DEFAULT_ACCESS_TOKEN_MINS: u64 = 15;
    const DEFAULT_REFRESH_TOKEN_DAYS: u64 = 7;
    const DEFAULT_LEEWAY_SECS: u64 = 30;
    const MIN_SECRET_LEN: usize = 32;

    pub fn from_env() -> Result<Self, String> {
        let secret = env::var("JWT_SECRET")
            .map_err(|_| "JWT_SECRET environment variable is required".to_string())?;
        if secret.len() < Self::MIN_SECRET_LEN {
            return Err(format!(
                "JWT_SECRET must be at least {} characters",
                Self::MIN_SECRET_LEN
            ));
        }

        let access_mins = parse_env("JWT_ACCESS_TOKEN_MINS", Self::DEFAULT_ACCESS_TOKEN_MINS)?;
        let refresh_days = parse_env("JWT_REFRESH_TOKEN_DAYS", Self::DEFAULT_REFRESH_TOKEN_DAYS)?;

        Ok(Self {
            secret,
            access_token_ttl: Duration::from_secs(access_mins * 60),
            refresh_token_ttl: Duration::from_secs(refresh_days * 24 * 60 * 60),
            leeway_secs: parse_env("JWT_LEEWAY_SECS", Self::DEFAULT_LEEWAY_SECS)?,
        })
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("SWAGGER_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("SWAGGER_PASSWORD").ok().filter(|s| !s.is_empty());
        let title =
            env::var("SWAGGER_TITLE").unwrap_or_else(|_| "Feedback Tracker API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION").unwrap_or_else(|_| {
            "Client feedback, issue tracking and analytics API".to_string()
        });

        Ok(Self {
            username,
            password,
            title,
            version,
            description,
        })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, String> {
        let backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "minio".to_string())
            .to_lowercase()
            .as_str()
        {
            "minio" | "s3" => StorageBackend::MinIO,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(format!(
                    "STORAGE_BACKEND must be 'minio' or 'memory', got '{}'",
                    other
                ))
            }
        };
        let endpoint =
            env::var("MINIO_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".to_string());
        let access_key = env::var("MINIO_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string());
        let secret_key = env::var("MINIO_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string());
        let bucket =
            env::var("MINIO_BUCKET").unwrap_or_else(|_| "feedback-tracker".to_string());
        let region = env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let attachments_prefix =
            env::var("STORAGE_ATTACHMENTS_PREFIX").unwrap_or_else(|_| "attachments".to_string());
        let reports_prefix =
            env::var("STORAGE_REPORTS_PREFIX").unwrap_or_else(|_| "reports".to_string());

        Ok(Self {
            backend,
            endpoint,
            access_key,
            secret_key,
            bucket,
            region,
            attachments_prefix,
            reports_prefix,
        })
    }
}

impl EmailConfig {
    const DEFAULT_SMTP_PORT: u16 = 587;
    const DEFAULT_FROM_ADDRESS: &'static str = "noreply@feedback-tracker.local";
    const DEFAULT_QUEUE_CAPACITY: usize = 256;

    /// Returns `Ok(None)` when `SMTP_HOST` is unset.
    pub fn from_env() -> Result<Option<Self>, String> {
        let Some(smtp_host) = env::var("SMTP_HOST").ok().filter(|s| !s.is_empty()) else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env("SMTP_PORT", Self::DEFAULT_SMTP_PORT)?,
            from_address: env::var("SMTP_FROM")
                .unwrap_or_else(|_| Self::DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: env::var("SMTP_USER").ok(),
            smtp_password: env::var("SMTP_PASSWORD").ok(),
            queue_capacity: parse_env("EMAIL_QUEUE_CAPACITY", Self::DEFAULT_QUEUE_CAPACITY)?,
        }))
    }
}

impl WorkerConfig {
    const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
    const DEFAULT_BATCH_SIZE: i64 = 5;
    const DEFAULT_MAX_RETRIES: i32 = 3;
    const DEFAULT_RETRY_BACKOFF_SECS: u64 = 60;
    const DEFAULT_FAILED_RETENTION_DAYS: i64 = 7;
    const DEFAULT_PROCESSING_TIMEOUT_SECS: u64 = 600;

    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            poll_interval: Duration::from_secs(parse_env(
                "REPORT_WORKER_POLL_SECS",
                Self::DEFAULT_POLL_INTERVAL_SECS,
            )?),
            batch_size: parse_env("REPORT_WORKER_BATCH_SIZE", Self::DEFAULT_BATCH_SIZE)?,
            max_retries: parse_env("REPORT_MAX_RETRIES", Self::DEFAULT_MAX_RETRIES)?,
            retry_backoff: Duration::from_secs(parse_env(
                "REPORT_RETRY_BACKOFF_SECS",
                Self::DEFAULT_RETRY_BACKOFF_SECS,
            )?),
            failed_retention_days: parse_env(
                "REPORT_FAILED_RETENTION_DAYS",
                Self::DEFAULT_FAILED_RETENTION_DAYS,
            )?,
            processing_timeout: Duration::from_secs(parse_env(
                "REPORT_PROCESSING_TIMEOUT_SECS",
                Self::DEFAULT_PROCESSING_TIMEOUT_SECS,
            )?),
        })
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(Self::DEFAULT_POLL_INTERVAL_SECS),
            batch_size: Self::DEFAULT_BATCH_SIZE,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            retry_backoff: Duration::from_secs(Self::DEFAULT_RETRY_BACKOFF_SECS),
            failed_retention_days: Self::DEFAULT_FAILED_RETENTION_DAYS,
            processing_timeout: Duration::from_secs(Self::DEFAULT_PROCESSING_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swagger_credentials_require_both_parts() {
        let mut swagger = SwaggerConfig {
            username: Some("docs".into()),
            password: None,
            title: "t".into(),
            version: "v".into(),
            description: "d".into(),
        };
        assert!(swagger.credentials().is_none());

        swagger.password = Some("secret".into());
        assert_eq!(swagger.credentials().as_deref(), Some("docs:secret"));
    }

    #[test]
    fn test_worker_defaults() {
        let worker = WorkerConfig::default();
        assert_eq!(worker.max_retries, 3);
        assert_eq!(worker.failed_retention_days, 7);
    }

    #[test]
    fn test_parse_env_falls_back_to_default() {
        let value: u32 = parse_env("FEEDBACK_TRACKER_UNSET_TEST_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }
}
