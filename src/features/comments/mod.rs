//! Threaded comments on issues.
//!
//! Comments are `public` or `internal`; clients never see internal ones.
//! `@name` and `@name@example.com` mentions notify the matching users and the
//! assignee hears about every new comment.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | `/api/issues/{id}/comments` | List comments |
//! | POST | `/api/issues/{id}/comments` | Add a comment or reply |
//! | PATCH | `/api/comments/{id}` | Edit own comment |
//! | DELETE | `/api/comments/{id}` | Delete own comment |

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use services::CommentService;
