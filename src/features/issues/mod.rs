//! Issues: creation, triage, assignment and status transitions.
//!
//! Every status change appends exactly one history row inside the same
//! transaction as the update; notifications go out after commit.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Who | Description |
//! |--------|----------|-----|-------------|
//! | POST | `/api/issues` | any | Report an issue |
//! | GET | `/api/issues` | any (scoped) | List with status/priority/assignee/reporter/search filters |
//! | GET | `/api/issues/{id}` | any (scoped) | Get an issue |
//! | PATCH | `/api/issues/{id}` | staff+ | Update title, description, priority, due date |
//! | DELETE | `/api/issues/{id}` | manager+ | Delete an issue |
//! | POST | `/api/issues/{id}/assign` | staff+ | Assign to a staff member |
//! | POST | `/api/issues/{id}/transition` | staff+ | Change status |
//! | GET | `/api/issues/{id}/history` | any (scoped) | Status history |

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use services::IssueService;
