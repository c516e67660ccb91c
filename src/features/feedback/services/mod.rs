mod feedback_service;
pub mod rules;

pub use feedback_service::FeedbackService;
