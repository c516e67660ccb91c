pub mod attachments;
pub mod auth;
pub mod comments;
pub mod feedback;
pub mod issues;
pub mod notifications;
pub mod reports;
pub mod users;
