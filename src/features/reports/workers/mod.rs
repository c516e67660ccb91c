mod report_worker;

pub use report_worker::ReportWorker;
