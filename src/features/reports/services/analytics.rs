//! Pure aggregation over issue, staff and feedback rows. The SQL side only
//! selects rows; every number in the report is computed here.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::features::feedback::models::FeedbackStatus;
use crate::features::issues::models::{IssuePriority, IssueStatus};
use crate::features::reports::models::ReportParameters;
use crate::shared::constants::{DEFAULT_ANALYTICS_DAYS, TREND_DAYS};

/// Resolved date range and filters of one analytics run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub priority: Vec<IssuePriority>,
    pub status: Vec<IssueStatus>,
}

impl AnalyticsWindow {
    pub fn resolve(params: &ReportParameters, today: NaiveDate) -> Self {
        let end = params.end_date.unwrap_or(today);
        let start = params.start_date.unwrap_or_else(|| {
            end.checked_sub_signed(Duration::days(DEFAULT_ANALYTICS_DAYS))
                .unwrap_or(NaiveDate::MIN)
        });
        Self {
            start,
            end,
            priority: params.priority.clone(),
            status: params.status.clone(),
        }
    }

    /// An inverted range selects nothing
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// First instant of `start` (UTC)
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.start.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// First instant after `end` (UTC); the range is half open
    pub fn ends_before(&self) -> DateTime<Utc> {
        match self.end.succ_opt() {
            Some(next) => next.and_time(chrono::NaiveTime::MIN).and_utc(),
            None => DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn status_filter(&self) -> Vec<String> {
        self.status.iter().map(|s| s.as_str().to_string()).collect()
    }

    pub fn priority_filter(&self) -> Vec<String> {
        self.priority.iter().map(|p| p.as_str().to_string()).collect()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct IssueFacts {
    pub status: IssueStatus,
    pub priority: IssuePriority,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// First comment by anyone other than the reporter
    pub first_response_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct StaffMember {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct FeedbackFacts {
    pub status: FeedbackStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnalyticsPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct AnalyticsSummary {
    pub total: i64,
    pub open: i64,
    pub in_progress: i64,
    pub resolved: i64,
    pub closed: i64,
    pub reopened: i64,
    pub unassigned: i64,
    pub overdue: i64,
    /// Percent of issues with a due date that met it
    pub sla_compliance: f64,
    pub avg_first_response_hours: f64,
    pub avg_resolution_hours: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CountShare {
    pub key: String,
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamMemberStats {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub assigned: i64,
    pub resolved: i64,
    /// resolved / assigned as a percentage
    pub efficiency: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DailyTrend {
    pub date: NaiveDate,
    pub created: i64,
    pub resolved: i64,
    pub feedback: i64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct FeedbackSummary {
    pub total: i64,
    pub new: i64,
    pub acknowledged: i64,
    pub converted: i64,
    pub closed: i64,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnalyticsReport {
    pub period: AnalyticsPeriod,
    pub summary: AnalyticsSummary,
    pub issues_by_status: Vec<CountShare>,
    pub issues_by_priority: Vec<CountShare>,
    pub team_performance: Vec<TeamMemberStats>,
    pub daily_trend: Vec<DailyTrend>,
    pub feedback: FeedbackSummary,
    pub generated_at: DateTime<Utc>,
}

/// `part / whole` as a percentage with one decimal; 0 when `whole` is 0
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round1(part as f64 / whole as f64 * 100.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn mean_hours(durations: impl Iterator<Item = Duration>) -> f64 {
    let (count, seconds) = durations.fold((0i64, 0i64), |(n, total), d| {
        (n + 1, total + d.num_seconds())
    });
    if count == 0 {
        return 0.0;
    }
    round1(seconds as f64 / count as f64 / 3600.0)
}

impl AnalyticsReport {
    pub fn empty(window: &AnalyticsWindow, now: DateTime<Utc>) -> Self {
        Self {
            period: AnalyticsPeriod {
                start: window.start,
                end: window.end,
            },
            summary: AnalyticsSummary {
                sla_compliance: 100.0,
                ..Default::default()
            },
            issues_by_status: Vec::new(),
            issues_by_priority: Vec::new(),
            team_performance: Vec::new(),
            daily_trend: Vec::new(),
            feedback: FeedbackSummary::default(),
            generated_at: now,
        }
    }

    pub fn build(
        window: &AnalyticsWindow,
        issues: &[IssueFacts],
        staff: &[StaffMember],
        feedback: &[FeedbackFacts],
        now: DateTime<Utc>,
    ) -> Self {
        if window.is_empty() {
            return Self::empty(window, now);
        }

        let total = issues.len() as i64;
        let count_status = |status: IssueStatus| {
            issues.iter().filter(|i| i.status == status).count() as i64
        };

        let with_due: Vec<&IssueFacts> = issues.iter().filter(|i| i.due_date.is_some()).collect();
        let met_due = with_due
            .iter()
            .filter(|i| match (i.resolved_at, i.due_date) {
                (Some(resolved), Some(due)) => resolved <= due,
                (None, Some(due)) => due >= now,
                _ => false,
            })
            .count() as i64;
        let sla_compliance = if with_due.is_empty() {
            100.0
        } else {
            percentage(met_due, with_due.len() as i64)
        };

        let summary = AnalyticsSummary {
            total,
            open: count_status(IssueStatus::Open),
            in_progress: count_status(IssueStatus::InProgress),
            resolved: count_status(IssueStatus::Resolved),
            closed: count_status(IssueStatus::Closed),
            reopened: count_status(IssueStatus::Reopen),
            unassigned: issues.iter().filter(|i| i.assignee_id.is_none()).count() as i64,
            overdue: issues
                .iter()
                .filter(|i| !i.status.is_terminal() && i.due_date.is_some_and(|due| due < now))
                .count() as i64,
            sla_compliance,
            avg_first_response_hours: mean_hours(
                issues
                    .iter()
                    .filter_map(|i| i.first_response_at.map(|at| at - i.created_at)),
            ),
            avg_resolution_hours: mean_hours(
                issues
                    .iter()
                    .filter_map(|i| i.resolved_at.map(|at| at - i.created_at)),
            ),
        };

        let issues_by_status = IssueStatus::ALL
            .iter()
            .map(|&status| {
                let count = count_status(status);
                CountShare {
                    key: status.as_str().to_string(),
                    count,
                    percentage: percentage(count, total),
                }
            })
            .collect();

        let issues_by_priority = IssuePriority::ALL
            .iter()
            .map(|&priority| {
                let count = issues.iter().filter(|i| i.priority == priority).count() as i64;
                CountShare {
                    key: priority.as_str().to_string(),
                    count,
                    percentage: percentage(count, total),
                }
            })
            .collect();

        let team_performance = staff
            .iter()
            .map(|member| {
                let assigned: Vec<&IssueFacts> = issues
                    .iter()
                    .filter(|i| i.assignee_id == Some(member.id))
                    .collect();
                let resolved = assigned.iter().filter(|i| i.status.is_terminal()).count() as i64;
                TeamMemberStats {
                    user_id: member.id,
                    name: member.name.clone(),
                    email: member.email.clone(),
                    assigned: assigned.len() as i64,
                    resolved,
                    efficiency: percentage(resolved, assigned.len() as i64),
                }
            })
            .collect();

        Self {
            period: AnalyticsPeriod {
                start: window.start,
                end: window.end,
            },
            summary,
            issues_by_status,
            issues_by_priority,
            team_performance,
            daily_trend: daily_trend(window, issues, feedback),
            feedback: feedback_summary(feedback),
            generated_at: now,
        }
    }
}

/// Per-day counts for the last `TREND_DAYS` days of the window
fn daily_trend(
    window: &AnalyticsWindow,
    issues: &[IssueFacts],
    feedback: &[FeedbackFacts],
) -> Vec<DailyTrend> {
    let first = window
        .end
        .checked_sub_signed(Duration::days(TREND_DAYS - 1))
        .unwrap_or(NaiveDate::MIN)
        .max(window.start);

    first
        .iter_days()
        .take_while(|day| *day <= window.end)
        .map(|date| DailyTrend {
            date,
            created: issues
                .iter()
                .filter(|i| i.created_at.date_naive() == date)
                .count() as i64,
            resolved: issues
                .iter()
                .filter(|i| i.resolved_at.is_some_and(|at| at.date_naive() == date))
                .count() as i64,
            feedback: feedback
                .iter()
                .filter(|f| f.created_at.date_naive() == date)
                .count() as i64,
        })
        .collect()
}

fn feedback_summary(feedback: &[FeedbackFacts]) -> FeedbackSummary {
    let count = |status: FeedbackStatus| feedback.iter().filter(|f| f.status == status).count() as i64;
    let total = feedback.len() as i64;
    let converted = count(FeedbackStatus::Converted);
    FeedbackSummary {
        total,
        new: count(FeedbackStatus::New),
        acknowledged: count(FeedbackStatus::Acknowledged),
        converted,
        closed: count(FeedbackStatus::Closed),
        conversion_rate: percentage(converted, total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    fn window(start: u32, end: u32) -> AnalyticsWindow {
        AnalyticsWindow {
            start: NaiveDate::from_ymd_opt(2025, 3, start).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 3, end).unwrap(),
            priority: Vec::new(),
            status: Vec::new(),
        }
    }

    fn issue(status: IssueStatus, created_at: DateTime<Utc>) -> IssueFacts {
        IssueFacts {
            status,
            priority: IssuePriority::Medium,
            assignee_id: None,
            due_date: None,
            resolved_at: status.is_terminal().then(|| created_at + Duration::hours(10)),
            created_at,
            first_response_at: None,
        }
    }

    fn member() -> StaffMember {
        StaffMember {
            id: Uuid::new_v4(),
            name: "Sam Support".to_string(),
            email: "sam@example.com".to_string(),
        }
    }

    #[test]
    fn test_window_defaults_to_last_thirty_days() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let window = AnalyticsWindow::resolve(&ReportParameters::default(), today);
        assert_eq!(window.end, today);
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(window.ends_before(), at(1, 0) + Duration::days(31));
        assert_eq!(window.starts_at(), at(1, 0));
    }

    #[test]
    fn test_inverted_range_is_empty_not_an_error() {
        let w = window(20, 10);
        assert!(w.is_empty());

        let issues = vec![issue(IssueStatus::Open, at(15, 9))];
        let report = AnalyticsReport::build(&w, &issues, &[member()], &[], at(31, 0));
        assert_eq!(report.summary.total, 0);
        assert!(report.issues_by_status.is_empty());
        assert!(report.team_performance.is_empty());
        assert!(report.daily_trend.is_empty());
    }

    #[test]
    fn test_window_at_calendar_limits_does_not_overflow() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();

        let latest = ReportParameters {
            end_date: Some(NaiveDate::MAX),
            ..Default::default()
        };
        let w = AnalyticsWindow::resolve(&latest, today);
        assert_eq!(w.ends_before(), DateTime::<Utc>::MAX_UTC);
        let report = AnalyticsReport::build(&w, &[], &[], &[], at(31, 0));
        assert_eq!(report.daily_trend.len() as i64, TREND_DAYS);

        let earliest = ReportParameters {
            end_date: Some(NaiveDate::MIN),
            ..Default::default()
        };
        let w = AnalyticsWindow::resolve(&earliest, today);
        assert_eq!(w.start, NaiveDate::MIN);
        let report = AnalyticsReport::build(&w, &[], &[], &[], at(31, 0));
        assert_eq!(report.daily_trend.len(), 1);
    }

    #[test]
    fn test_percentages_round_to_one_decimal() {
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(5, 5), 100.0);
    }

    #[test]
    fn test_status_and_priority_breakdown() {
        let mut critical = issue(IssueStatus::Open, at(2, 9));
        critical.priority = IssuePriority::Critical;
        let issues = vec![
            critical,
            issue(IssueStatus::Open, at(3, 9)),
            issue(IssueStatus::Closed, at(4, 9)),
        ];
        let report = AnalyticsReport::build(&window(1, 31), &issues, &[], &[], at(31, 0));

        let open = &report.issues_by_status[0];
        assert_eq!((open.key.as_str(), open.count, open.percentage), ("open", 2, 66.7));
        assert_eq!(report.issues_by_status.len(), IssueStatus::ALL.len());

        let critical = report
            .issues_by_priority
            .iter()
            .find(|p| p.key == "critical")
            .unwrap();
        assert_eq!((critical.count, critical.percentage), (1, 33.3));
        assert_eq!(report.summary.open, 2);
        assert_eq!(report.summary.closed, 1);
        assert_eq!(report.summary.unassigned, 3);
    }

    #[test]
    fn test_efficiency_is_zero_without_assignments() {
        let idle = member();
        let busy = member();
        let mut done = issue(IssueStatus::Resolved, at(2, 9));
        done.assignee_id = Some(busy.id);
        let mut pending = issue(IssueStatus::InProgress, at(2, 9));
        pending.assignee_id = Some(busy.id);

        let report = AnalyticsReport::build(
            &window(1, 31),
            &[done, pending],
            &[idle.clone(), busy.clone()],
            &[],
            at(31, 0),
        );

        let idle_stats = &report.team_performance[0];
        assert_eq!((idle_stats.assigned, idle_stats.efficiency), (0, 0.0));
        let busy_stats = &report.team_performance[1];
        assert_eq!(
            (busy_stats.assigned, busy_stats.resolved, busy_stats.efficiency),
            (2, 1, 50.0)
        );
    }

    #[test]
    fn test_sla_is_full_without_due_dates() {
        let issues = vec![issue(IssueStatus::Open, at(2, 9))];
        let report = AnalyticsReport::build(&window(1, 31), &issues, &[], &[], at(31, 0));
        assert_eq!(report.summary.sla_compliance, 100.0);
    }

    #[test]
    fn test_sla_compliance() {
        let now = at(20, 0);

        // Resolved before its due date
        let mut met = issue(IssueStatus::Resolved, at(2, 0));
        met.due_date = Some(at(5, 0));
        // Resolved after its due date
        let mut late = issue(IssueStatus::Resolved, at(2, 0));
        late.due_date = Some(at(2, 5));
        // Still open, due date in the future
        let mut on_track = issue(IssueStatus::Open, at(3, 0));
        on_track.due_date = Some(at(25, 0));
        // Still open, due date passed
        let mut overdue = issue(IssueStatus::InProgress, at(3, 0));
        overdue.due_date = Some(at(10, 0));

        let report = AnalyticsReport::build(
            &window(1, 31),
            &[met, late, on_track, overdue],
            &[],
            &[],
            now,
        );
        assert_eq!(report.summary.sla_compliance, 50.0);
        assert_eq!(report.summary.overdue, 1);
    }

    #[test]
    fn test_average_first_response() {
        let mut quick = issue(IssueStatus::Open, at(2, 0));
        quick.first_response_at = Some(at(2, 2));
        let mut slow = issue(IssueStatus::Open, at(2, 0));
        slow.first_response_at = Some(at(2, 5));
        let silent = issue(IssueStatus::Open, at(2, 0));

        let report =
            AnalyticsReport::build(&window(1, 31), &[quick, slow, silent], &[], &[], at(31, 0));
        assert_eq!(report.summary.avg_first_response_hours, 3.5);

        let report = AnalyticsReport::build(
            &window(1, 31),
            &[issue(IssueStatus::Open, at(2, 0))],
            &[],
            &[],
            at(31, 0),
        );
        assert_eq!(report.summary.avg_first_response_hours, 0.0);
    }

    #[test]
    fn test_daily_trend_covers_last_days_of_window() {
        let issues = vec![
            issue(IssueStatus::Open, at(30, 8)),
            issue(IssueStatus::Resolved, at(31, 1)),
        ];
        let feedback = vec![FeedbackFacts {
            status: FeedbackStatus::New,
            created_at: at(31, 12),
        }];
        let report = AnalyticsReport::build(&window(1, 31), &issues, &[], &feedback, at(31, 23));

        assert_eq!(report.daily_trend.len(), TREND_DAYS as usize);
        assert_eq!(
            report.daily_trend[0].date,
            NaiveDate::from_ymd_opt(2025, 3, 25).unwrap()
        );
        let last = report.daily_trend.last().unwrap();
        assert_eq!((last.created, last.resolved, last.feedback), (1, 1, 1));

        // A short window yields one entry per day
        let report = AnalyticsReport::build(&window(30, 31), &issues, &[], &[], at(31, 23));
        assert_eq!(report.daily_trend.len(), 2);
    }

    #[test]
    fn test_feedback_conversion_rate() {
        let feedback: Vec<FeedbackFacts> = [
            FeedbackStatus::Converted,
            FeedbackStatus::New,
            FeedbackStatus::Closed,
        ]
        .into_iter()
        .map(|status| FeedbackFacts {
            status,
            created_at: at(2, 0),
        })
        .collect();

        let summary = feedback_summary(&feedback);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.converted, 1);
        assert_eq!(summary.conversion_rate, 33.3);
        assert_eq!(feedback_summary(&[]).conversion_rate, 0.0);
    }
}
