//! Attachments: files linked to at most one issue, comment or feedback entry.
//!
//! The SHA-256 checksum is computed once on upload and checked again on every
//! download; no endpoint rewrites stored bytes.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Who | Description |
//! |--------|----------|-----|-------------|
//! | POST | `/api/attachments` | any | Multipart upload (pdf, jpg, jpeg, png, doc, docx, txt; 10 MiB) |
//! | GET | `/api/attachments` | any | Own uploads; staff see all. Filter by issue, comment, feedback |
//! | GET | `/api/attachments/{id}` | uploader or staff+ | Metadata |
//! | PATCH | `/api/attachments/{id}` | uploader or staff+ | Change the link |
//! | DELETE | `/api/attachments/{id}` | uploader or staff+ | Delete row and stored file |
//! | GET | `/api/attachments/{id}/download` | uploader or staff+ | File contents |

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use services::AttachmentService;
