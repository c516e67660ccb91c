mod issue_service;
pub mod transition;

pub use issue_service::{IssueScope, IssueService};
