mod comment;

pub use comment::{Comment, CommentVisibility, COMMENT_COLUMNS};
