//! User accounts and roles.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Who | Description |
//! |--------|----------|-----|-------------|
//! | GET | `/api/users/me` | any | Own profile |
//! | PATCH | `/api/users/me` | any | Update own name |
//! | GET | `/api/users` | manager, admin | List users (filter by role, active flag, search) |
//! | GET | `/api/users/staff` | staff+ | Active users that can be assigned issues |
//! | GET | `/api/users/{id}` | admin | Get a user |
//! | PATCH | `/api/users/{id}` | admin | Change name, role or active flag |
//! | DELETE | `/api/users/{id}` | admin | Deactivate a user |

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use services::UserService;
