mod report;

pub use report::{Report, ReportFormat, ReportParameters, ReportStatus, ReportType, REPORT_COLUMNS};
