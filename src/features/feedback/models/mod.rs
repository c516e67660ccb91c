mod feedback;

pub use feedback::{Feedback, FeedbackStatus, FEEDBACK_COLUMNS};
