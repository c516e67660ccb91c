pub mod analytics;
mod analytics_service;
pub mod render;
mod report_service;

pub use analytics_service::AnalyticsService;
pub use report_service::ReportService;
