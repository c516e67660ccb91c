//! Local email/password authentication.
//!
//! Access tokens are short-lived HS256 JWTs; refresh tokens are opaque,
//! stored hashed and rotated on every use.

pub mod dtos;
pub mod guards;
pub mod handlers;
pub mod model;
pub mod routes;
pub mod services;

pub use services::{AuthService, TokenService};
