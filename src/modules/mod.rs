//! Modules layer - Infrastructure components for external integrations
//!
//! Object storage for uploaded and generated files, and outbound email.

pub mod email;
pub mod storage;
