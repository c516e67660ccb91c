mod attachment_service;
pub mod file_rules;

pub use attachment_service::{AttachmentService, UploadedFile};
