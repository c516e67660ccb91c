/// Default page size for pagination
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Maximum page size allowed
pub const MAX_PAGE_SIZE: i64 = 100;

// =============================================================================
// AUTH
// =============================================================================

/// Failed logins before the account is temporarily locked
pub const MAX_FAILED_LOGIN_ATTEMPTS: i32 = 5;

/// Lock duration after too many failed logins
pub const ACCOUNT_LOCK_MINUTES: i64 = 15;

// =============================================================================
// ATTACHMENTS
// =============================================================================

/// Maximum attachment size (10MB)
pub const MAX_ATTACHMENT_SIZE: usize = 10 * 1024 * 1024;

/// Accepted attachment extensions with their MIME type
pub const ALLOWED_ATTACHMENT_TYPES: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("txt", "text/plain"),
];

// =============================================================================
// ANALYTICS
// =============================================================================

/// Window used when an analytics request omits its date range
pub const DEFAULT_ANALYTICS_DAYS: i64 = 30;

/// Days shown in the daily trend series
pub const TREND_DAYS: i64 = 7;

/// Accepted calendar years for analytics and report date filters
pub const MIN_ANALYTICS_YEAR: i32 = 1970;
pub const MAX_ANALYTICS_YEAR: i32 = 9999;
