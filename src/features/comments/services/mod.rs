mod comment_service;
pub mod mentions;

pub use comment_service::CommentService;
