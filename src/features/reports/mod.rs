//! Reports: on-demand analytics and queued report files.
//!
//! `POST /api/reports` stores a `pending` row and returns. The
//! [`workers::ReportWorker`] claims due rows with `FOR UPDATE SKIP LOCKED`,
//! renders them (csv, pdf, json or html) into object storage and marks them
//! `generated`. Failed attempts go back to `pending` after a fixed backoff
//! until retries run out, then stay `failed`.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Who | Description |
//! |--------|----------|-----|-------------|
//! | POST | `/api/reports` | staff+ | Queue a report |
//! | GET | `/api/reports` | staff+ | Own reports; managers see all |
//! | GET | `/api/reports/{id}` | owner or manager+ | Report record |
//! | DELETE | `/api/reports/{id}` | owner or manager+ | Delete record and file |
//! | GET | `/api/reports/{id}/status` | owner or manager+ | Poll generation |
//! | GET | `/api/reports/{id}/download` | owner or manager+ | Generated file |
//! | GET | `/api/reports/analytics` | staff+ | Analytics JSON |
//! | GET | `/api/reports/metrics` | staff+ | Live counts |
//! | GET | `/api/reports/export` | staff+ | Issues as CSV |

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod workers;

pub use services::{AnalyticsService, ReportService};
pub use workers::ReportWorker;
