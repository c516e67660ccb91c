//! Status transition planning.
//!
//! Pure functions deciding what a transition writes and who hears about it,
//! so the rules are testable without a database.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::features::issues::models::{Issue, IssueStatus};
use crate::features::notifications::models::NotificationType;

/// The single history row a transition appends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub old_status: Option<IssueStatus>,
    pub new_status: IssueStatus,
    pub changed_by_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub new_status: IssueStatus,
    pub resolved_at: Option<DateTime<Utc>>,
    pub history: HistoryEntry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedNotification {
    pub recipient_id: Uuid,
    pub kind: NotificationType,
    pub message: String,
}

/// Returns `None` when `target` equals the current status.
///
/// `resolved_at` is stamped on entering a terminal state, kept when moving
/// between terminal states and cleared when leaving them.
pub fn plan_transition(
    issue: &Issue,
    target: IssueStatus,
    actor_id: Uuid,
    now: DateTime<Utc>,
) -> Option<TransitionPlan> {
    if issue.status == target {
        return None;
    }

    let resolved_at = if target.is_terminal() {
        issue
            .resolved_at
            .filter(|_| issue.status.is_terminal())
            .or(Some(now))
    } else {
        None
    };

    Some(TransitionPlan {
        new_status: target,
        resolved_at,
        history: HistoryEntry {
            old_status: Some(issue.status),
            new_status: target,
            changed_by_id: Some(actor_id),
        },
    })
}

/// Recipients of a transition, excluding the actor. `managers` are the active
/// manager/admin ids, consulted only for terminal states.
pub fn transition_notifications(
    issue: &Issue,
    plan: &TransitionPlan,
    actor_id: Uuid,
    actor_email: &str,
    managers: &[Uuid],
) -> Vec<PlannedNotification> {
    let old = plan
        .history
        .old_status
        .map(|s| s.as_str())
        .unwrap_or("none");
    let new = plan.new_status;
    let mut out: Vec<PlannedNotification> = Vec::new();

    let mut push = |recipient_id: Uuid, message: String| {
        if recipient_id != actor_id && !out.iter().any(|n| n.recipient_id == recipient_id) {
            out.push(PlannedNotification {
                recipient_id,
                kind: NotificationType::StatusChange,
                message,
            });
        }
    };

    if let Some(assignee_id) = issue.assignee_id {
        push(
            assignee_id,
            format!(
                "Issue \"{}\" status changed from {} to {}",
                issue.title, old, new
            ),
        );
    }

    let reporter_message = if new.is_terminal() {
        format!("Great news! Your issue \"{}\" has been {}", issue.title, new)
    } else {
        format!(
            "Your issue \"{}\" status changed from {} to {}",
            issue.title, old, new
        )
    };
    push(issue.reporter_id, reporter_message);

    if new.is_terminal() {
        for &manager_id in managers {
            push(
                manager_id,
                format!(
                    "Issue \"{}\" marked as {} by {}",
                    issue.title, new, actor_email
                ),
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::issues::models::IssuePriority;
    use chrono::Duration;

    fn issue(status: IssueStatus) -> Issue {
        let now = Utc::now();
        Issue {
            id: Uuid::new_v4(),
            title: "Login fails".to_string(),
            description: "Cannot sign in".to_string(),
            status,
            priority: IssuePriority::High,
            reporter_id: Uuid::new_v4(),
            assignee_id: Some(Uuid::new_v4()),
            created_by_id: Uuid::new_v4(),
            due_date: None,
            resolved_at: status.is_terminal().then_some(now - Duration::hours(1)),
            created_at: now - Duration::days(1),
            updated_at: now,
        }
    }

    #[test]
    fn test_same_status_is_noop() {
        for status in IssueStatus::ALL {
            assert!(plan_transition(&issue(status), status, Uuid::new_v4(), Utc::now()).is_none());
        }
    }

    #[test]
    fn test_every_change_records_one_history_entry() {
        let actor = Uuid::new_v4();
        for from in IssueStatus::ALL {
            for to in IssueStatus::ALL.into_iter().filter(|s| *s != from) {
                let plan = plan_transition(&issue(from), to, actor, Utc::now()).unwrap();
                assert_eq!(
                    plan.history,
                    HistoryEntry {
                        old_status: Some(from),
                        new_status: to,
                        changed_by_id: Some(actor),
                    }
                );
            }
        }
    }

    #[test]
    fn test_resolved_at_lifecycle() {
        let now = Utc::now();
        let actor = Uuid::new_v4();

        let plan = plan_transition(&issue(IssueStatus::InProgress), IssueStatus::Resolved, actor, now)
            .unwrap();
        assert_eq!(plan.resolved_at, Some(now));

        let resolved = issue(IssueStatus::Resolved);
        let plan = plan_transition(&resolved, IssueStatus::Closed, actor, now).unwrap();
        assert_eq!(plan.resolved_at, resolved.resolved_at);

        let plan = plan_transition(&resolved, IssueStatus::Reopen, actor, now).unwrap();
        assert_eq!(plan.resolved_at, None);
    }

    #[test]
    fn test_notifications_skip_actor() {
        let issue = issue(IssueStatus::Open);
        let actor = issue.assignee_id.unwrap();
        let plan = plan_transition(&issue, IssueStatus::InProgress, actor, Utc::now()).unwrap();

        let planned = transition_notifications(&issue, &plan, actor, "staff@example.com", &[]);
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].recipient_id, issue.reporter_id);
        assert_eq!(
            planned[0].message,
            "Your issue \"Login fails\" status changed from open to in_progress"
        );
    }

    #[test]
    fn test_terminal_state_notifies_managers_once() {
        let issue = issue(IssueStatus::InProgress);
        let actor = Uuid::new_v4();
        let manager = Uuid::new_v4();
        let plan = plan_transition(&issue, IssueStatus::Resolved, actor, Utc::now()).unwrap();

        // The actor and a duplicate are filtered out
        let planned = transition_notifications(
            &issue,
            &plan,
            actor,
            "boss@example.com",
            &[manager, actor, manager],
        );
        let recipients: Vec<_> = planned.iter().map(|n| n.recipient_id).collect();
        assert_eq!(
            recipients,
            vec![issue.assignee_id.unwrap(), issue.reporter_id, manager]
        );
        assert!(planned[1].message.starts_with("Great news!"));
        assert!(planned
            .iter()
            .all(|n| n.kind == NotificationType::StatusChange));
    }

    #[test]
    fn test_non_terminal_ignores_managers() {
        let issue = issue(IssueStatus::Resolved);
        let plan = plan_transition(&issue, IssueStatus::Reopen, Uuid::new_v4(), Utc::now()).unwrap();
        let planned =
            transition_notifications(&issue, &plan, Uuid::new_v4(), "x@example.com", &[Uuid::new_v4()]);
        assert_eq!(planned.len(), 2);
    }
}
