pub mod feedback_handler;

pub use feedback_handler::*;
