use std::borrow::Cow;
use std::sync::OnceLock;

use minijinja::{context, Environment};

use crate::core::error::{AppError, Result};
use crate::features::reports::models::{ReportFormat, ReportType};
use crate::features::reports::services::analytics::{AnalyticsReport, CountShare};

/// One titled grid of cells; every format renders reports as a list of these
#[derive(Debug, Clone, serde::Serialize)]
pub struct Table {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn new(title: &str, headers: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn row(mut self, cells: Vec<String>) -> Self {
        self.rows.push(cells);
        self
    }
}

fn metric(table: Table, name: &str, value: impl ToString) -> Table {
    table.row(vec![name.to_string(), value.to_string()])
}

fn summary_table(report: &AnalyticsReport) -> Table {
    let s = &report.summary;
    let table = Table::new("Summary", &["Metric", "Value"]);
    let table = metric(table, "Total issues", s.total);
    let table = metric(table, "Open", s.open);
    let table = metric(table, "In progress", s.in_progress);
    let table = metric(table, "Resolved", s.resolved);
    let table = metric(table, "Closed", s.closed);
    let table = metric(table, "Reopened", s.reopened);
    let table = metric(table, "Unassigned", s.unassigned);
    metric(table, "Overdue", s.overdue)
}

fn service_levels_table(report: &AnalyticsReport) -> Table {
    let s = &report.summary;
    let table = Table::new("Service Levels", &["Metric", "Value"]);
    let table = metric(table, "SLA compliance %", s.sla_compliance);
    let table = metric(table, "Avg first response (hours)", s.avg_first_response_hours);
    let table = metric(table, "Avg resolution (hours)", s.avg_resolution_hours);
    let table = metric(table, "Resolved", s.resolved + s.closed);
    metric(table, "Overdue", s.overdue)
}

fn breakdown_table(title: &str, label: &str, shares: &[CountShare]) -> Table {
    shares.iter().fold(
        Table::new(title, &[label, "Count", "Percentage"]),
        |table, share| {
            table.row(vec![
                share.key.clone(),
                share.count.to_string(),
                share.percentage.to_string(),
            ])
        },
    )
}

fn assignee_table(report: &AnalyticsReport) -> Table {
    report.team_performance.iter().fold(
        Table::new("Issues by Assignee", &["Name", "Email", "Assigned", "Resolved"]),
        |table, m| {
            table.row(vec![
                m.name.clone(),
                m.email.clone(),
                m.assigned.to_string(),
                m.resolved.to_string(),
            ])
        },
    )
}

fn team_table(report: &AnalyticsReport) -> Table {
    report.team_performance.iter().fold(
        Table::new(
            "Team Performance",
            &["Name", "Email", "Assigned", "Resolved", "Efficiency %"],
        ),
        |table, m| {
            table.row(vec![
                m.name.clone(),
                m.email.clone(),
                m.assigned.to_string(),
                m.resolved.to_string(),
                m.efficiency.to_string(),
            ])
        },
    )
}

fn trend_table(report: &AnalyticsReport) -> Table {
    report.daily_trend.iter().fold(
        Table::new("Daily Trend", &["Date", "Created", "Resolved", "Feedback"]),
        |table, day| {
            table.row(vec![
                day.date.to_string(),
                day.created.to_string(),
                day.resolved.to_string(),
                day.feedback.to_string(),
            ])
        },
    )
}

fn feedback_table(report: &AnalyticsReport) -> Table {
    let f = &report.feedback;
    let table = Table::new("Feedback", &["Metric", "Value"]);
    let table = metric(table, "Total", f.total);
    let table = metric(table, "New", f.new);
    let table = metric(table, "Acknowledged", f.acknowledged);
    let table = metric(table, "Converted", f.converted);
    let table = metric(table, "Closed", f.closed);
    metric(table, "Conversion rate %", f.conversion_rate)
}

/// Sections included for each report type
pub fn tables_for(kind: ReportType, report: &AnalyticsReport) -> Vec<Table> {
    let by_status = || breakdown_table("Issues by Status", "Status", &report.issues_by_status);
    let by_priority =
        || breakdown_table("Issues by Priority", "Priority", &report.issues_by_priority);

    match kind {
        ReportType::IssuesByStatus => vec![summary_table(report), by_status()],
        ReportType::IssuesByPriority => vec![summary_table(report), by_priority()],
        ReportType::IssuesByAssignee => vec![assignee_table(report)],
        ReportType::TeamPerformance => vec![team_table(report), service_levels_table(report)],
        ReportType::ResolutionAnalytics => {
            vec![service_levels_table(report), trend_table(report)]
        }
        ReportType::FeedbackSummary => vec![feedback_table(report)],
        ReportType::PerformanceDashboard => vec![
            summary_table(report),
            service_levels_table(report),
            by_status(),
            by_priority(),
            team_table(report),
            trend_table(report),
            feedback_table(report),
        ],
    }
}

/// Render a report document in the requested format
pub fn render(
    kind: ReportType,
    format: ReportFormat,
    title: &str,
    report: &AnalyticsReport,
) -> Result<Vec<u8>> {
    let period = format!("{} to {}", report.period.start, report.period.end);
    let generated = report.generated_at.format("%Y-%m-%d %H:%M UTC").to_string();

    match format {
        ReportFormat::Csv => {
            let tables = tables_for(kind, report);
            Ok(render_csv(title, &period, &generated, &tables).into_bytes())
        }
        ReportFormat::Pdf => {
            let tables = tables_for(kind, report);
            Ok(render_pdf(title, &period, &generated, &tables))
        }
        ReportFormat::Html => {
            let tables = tables_for(kind, report);
            render_html(title, &period, &generated, &tables).map(String::into_bytes)
        }
        ReportFormat::Json => serde_json::to_vec_pretty(&serde_json::json!({
            "title": title,
            "report_type": kind,
            "analytics": report,
        }))
        .map_err(|e| AppError::Internal(format!("Failed to serialize report: {}", e))),
    }
}

// =============================================================================
// CSV
// =============================================================================

pub fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

pub fn csv_line<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = fields
        .iter()
        .map(|f| csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

fn render_csv(title: &str, period: &str, generated: &str, tables: &[Table]) -> String {
    let mut out = csv_line(&[title]);
    out.push_str(&csv_line(&["Period", period]));
    out.push_str(&csv_line(&["Generated", generated]));

    for table in tables {
        out.push('\n');
        out.push_str(&csv_line(&[table.title.as_str()]));
        out.push_str(&csv_line(&table.headers));
        for row in &table.rows {
            out.push_str(&csv_line(row));
        }
    }
    out
}

// =============================================================================
// PDF
// =============================================================================

const PAGE_WIDTH: u32 = 612;
const PAGE_HEIGHT: u32 = 792;
const MARGIN: u32 = 50;
const LEADING: u32 = 12;
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;
const MAX_CELL_WIDTH: usize = 32;

/// Lay tables out as fixed-width text lines
fn text_lines(title: &str, period: &str, generated: &str, tables: &[Table]) -> Vec<String> {
    let mut lines = vec![
        title.to_string(),
        format!("Period: {}", period),
        format!("Generated: {}", generated),
    ];

    for table in tables {
        let cell = |s: &str| -> String { s.chars().take(MAX_CELL_WIDTH).collect() };
        let widths: Vec<usize> = (0..table.headers.len())
            .map(|col| {
                std::iter::once(&table.headers[col])
                    .chain(table.rows.iter().filter_map(|r| r.get(col)))
                    .map(|s| cell(s).chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();
        let format_row = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:<width$}", cell(c), width = *w))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        lines.push(String::new());
        lines.push(table.title.clone());
        lines.push(format_row(table.headers.as_slice()));
        lines.push("-".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)));
        lines.extend(table.rows.iter().map(|r| format_row(r.as_slice())));
    }
    lines
}

/// Escape a line for a PDF literal string. Courier only covers Latin-1,
/// anything else prints as `?`.
fn pdf_text(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for c in line.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Minimal PDF 1.4: one Courier font, text-only pages and a cross-reference
/// table
fn render_pdf(title: &str, period: &str, generated: &str, tables: &[Table]) -> Vec<u8> {
    let lines = text_lines(title, period, generated, tables);
    let pages: Vec<&[String]> = lines.chunks(LINES_PER_PAGE).collect();

    // Objects: 1 catalog, 2 page tree, 3 font, then a page and its content
    // stream for every page
    let page_ids: Vec<usize> = (0..pages.len()).map(|i| 4 + 2 * i).collect();
    let mut objects: Vec<String> = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            page_ids
                .iter()
                .map(|id| format!("{} 0 R", id))
                .collect::<Vec<_>>()
                .join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Courier >>".to_string(),
    ];

    for (page, id) in pages.iter().zip(&page_ids) {
        let mut content = format!(
            "BT /F1 9 Tf {} TL {} {} Td\n",
            LEADING,
            MARGIN,
            PAGE_HEIGHT - MARGIN
        );
        for line in page.iter() {
            content.push_str(&format!("({}) Tj T*\n", pdf_text(line)));
        }
        content.push_str("ET");

        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            PAGE_WIDTH,
            PAGE_HEIGHT,
            id + 1
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }

    let xref_at = out.len();
    out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        out.push_str(&format!("{:010} 00000 n \n", offset));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    ));
    out.into_bytes()
}

// =============================================================================
// HTML
// =============================================================================

static ENV: OnceLock<Environment<'static>> = OnceLock::new();

const REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{{ title }}</title>
  <style>
    body { font-family: Arial, sans-serif; margin: 40px; }
    h1 { color: #0EA5A4; }
    table { border-collapse: collapse; width: 100%; margin: 20px 0; }
    th, td { border: 1px solid #ddd; padding: 8px 12px; text-align: left; }
    th { background-color: #0EA5A4; color: white; }
  </style>
</head>
<body>
  <h1>{{ title }}</h1>
  <p>Period: {{ period }}<br>Generated: {{ generated }}</p>
  {% for table in tables %}
  <h2>{{ table.title }}</h2>
  <table>
    <tr>{% for header in table.headers %}<th>{{ header }}</th>{% endfor %}</tr>
    {% for row in table.rows %}
    <tr>{% for cell in row %}<td>{{ cell }}</td>{% endfor %}</tr>
    {% else %}
    <tr><td colspan="{{ table.headers | length }}">No data</td></tr>
    {% endfor %}
  </table>
  {% endfor %}
</body>
</html>
"#;

fn environment() -> &'static Environment<'static> {
    ENV.get_or_init(|| {
        let mut env = Environment::new();
        if let Err(e) = env.add_template("report.html", REPORT_TEMPLATE) {
            tracing::error!("Invalid report template: {}", e);
        }
        env
    })
}

fn render_html(title: &str, period: &str, generated: &str, tables: &[Table]) -> Result<String> {
    environment()
        .get_template("report.html")
        .and_then(|t| {
            t.render(context! {
                title => title,
                period => period,
                generated => generated,
                tables => tables,
            })
        })
        .map_err(|e| AppError::Internal(format!("Failed to render HTML report: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reports::services::analytics::{AnalyticsWindow, StaffMember};
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn sample() -> AnalyticsReport {
        let window = AnalyticsWindow {
            start: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            priority: Vec::new(),
            status: Vec::new(),
        };
        let staff = vec![StaffMember {
            id: Uuid::new_v4(),
            name: "Dana \"DJ\" Jones".to_string(),
            email: "dana@example.com".to_string(),
        }];
        AnalyticsReport::build(&window, &[], &staff, &[], Utc::now())
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_line(&["a", "b,c"]), "a,\"b,c\"\n");
    }

    #[test]
    fn test_sections_follow_report_type() {
        let report = sample();
        let titles = |kind| {
            tables_for(kind, &report)
                .into_iter()
                .map(|t| t.title)
                .collect::<Vec<_>>()
        };
        assert_eq!(titles(ReportType::IssuesByStatus), ["Summary", "Issues by Status"]);
        assert_eq!(titles(ReportType::FeedbackSummary), ["Feedback"]);
        assert_eq!(titles(ReportType::PerformanceDashboard).len(), 7);
    }

    #[test]
    fn test_csv_report() {
        let bytes = render(
            ReportType::TeamPerformance,
            ReportFormat::Csv,
            "Team",
            &sample(),
        )
        .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("Team\nPeriod,2025-03-01 to 2025-03-31\n"));
        assert!(text.contains("Name,Email,Assigned,Resolved,Efficiency %\n"));
        assert!(text.contains("\"Dana \"\"DJ\"\" Jones\",dana@example.com,0,0,0\n"));
    }

    #[test]
    fn test_pdf_structure() {
        let bytes = render(
            ReportType::PerformanceDashboard,
            ReportFormat::Pdf,
            "Dashboard (March)",
            &sample(),
        )
        .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("%PDF-1.4\n"));
        assert!(text.ends_with("%%EOF\n"));
        assert!(text.contains("(Dashboard \\(March\\)) Tj"));

        // startxref points at the xref table
        let start: usize = text
            .lines()
            .rev()
            .nth(1)
            .and_then(|l| l.parse().ok())
            .unwrap();
        assert!(text[start..].starts_with("xref\n"));
    }

    #[test]
    fn test_pdf_paginates_long_reports() {
        let mut table = Table::new("Long", &["N"]);
        for i in 0..(LINES_PER_PAGE * 2) {
            table = table.row(vec![i.to_string()]);
        }
        let text = String::from_utf8(render_pdf("t", "p", "g", &[table])).unwrap();
        assert!(text.contains("/Count 3"));
    }

    #[test]
    fn test_html_escapes_values() {
        let mut table = Table::new("T", &["Name"]);
        table = table.row(vec!["<script>".to_string()]);
        let html = render_html("Report", "p", "g", &[table]).unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_json_report_carries_analytics() {
        let bytes = render(
            ReportType::IssuesByStatus,
            ReportFormat::Json,
            "Status",
            &sample(),
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["report_type"], "issues_by_status");
        assert_eq!(value["analytics"]["summary"]["sla_compliance"], 100.0);
    }
}
