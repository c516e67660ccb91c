//! Feedback from clients and anonymous visitors, and its conversion into issues.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Who | Description |
//! |--------|----------|-----|-------------|
//! | POST | `/api/feedback` | anyone | Submit feedback (token optional) |
//! | GET | `/api/feedback` | staff+ | List with status/search filters |
//! | GET | `/api/feedback/my` | any user | Own submissions |
//! | GET | `/api/feedback/{id}` | owner, staff+ | Get feedback |
//! | PATCH | `/api/feedback/{id}` | owner while new, staff+ | Edit |
//! | DELETE | `/api/feedback/{id}` | manager+ | Delete |
//! | POST | `/api/feedback/{id}/acknowledge` | staff+ | `new` to `acknowledged` |
//! | POST | `/api/feedback/{id}/close` | staff+ | Close |
//! | POST | `/api/feedback/{id}/convert` | staff+ | Create an issue from it |

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use services::FeedbackService;
