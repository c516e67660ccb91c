mod attachment;

pub use attachment::{Attachment, AttachmentTarget, ATTACHMENT_COLUMNS};
