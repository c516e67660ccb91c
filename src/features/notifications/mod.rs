//! In-app notifications with best-effort email delivery.
//!
//! Other features call [`NotificationService::notify`] after their own work has
//! been committed; a failure here is logged and never surfaces to the caller.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | `/api/notifications` | Own notifications, newest first (`unread_only` filter) |
//! | GET | `/api/notifications/unread-count` | Number of unread notifications |
//! | POST | `/api/notifications/{id}/read` | Mark one as read |
//! | POST | `/api/notifications/read-all` | Mark all as read |
//! | DELETE | `/api/notifications/{id}` | Delete one |

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use services::NotificationService;
