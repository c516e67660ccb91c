mod issue;
mod issue_history;

pub use issue::{Issue, IssuePriority, IssueStatus, NewIssue, ISSUE_COLUMNS};
pub use issue_history::{IssueHistory, ISSUE_HISTORY_COLUMNS};
