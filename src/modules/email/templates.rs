use std::sync::OnceLock;

use minijinja::{context, Environment};

use super::EmailMessage;

static ENV: OnceLock<Environment<'static>> = OnceLock::new();

const NOTIFICATION_SUBJECT: &str = "[Feedback Tracker] {{ title }}";

const NOTIFICATION_BODY: &str = "\
Hello {{ name }},

{{ message }}
{% if link %}
View it here: {{ link }}
{% endif %}
You are receiving this because you have an account on Feedback Tracker.
";

fn environment() -> &'static Environment<'static> {
    ENV.get_or_init(|| {
        let mut env = Environment::new();
        // Static sources; a failure here is a programming error caught by tests
        if let Err(e) = env.add_template("notification_subject", NOTIFICATION_SUBJECT) {
            tracing::error!("Invalid notification subject template: {}", e);
        }
        if let Err(e) = env.add_template("notification_body", NOTIFICATION_BODY) {
            tracing::error!("Invalid notification body template: {}", e);
        }
        env
    })
}

/// Build the email for an in-app notification. Falls back to the raw
/// message if rendering fails.
pub fn render_notification_email(
    to: &str,
    name: &str,
    title: &str,
    message: &str,
    link: Option<&str>,
) -> EmailMessage {
    let env = environment();
    let ctx = context! { name => name, title => title, message => message, link => link };

    let subject = env
        .get_template("notification_subject")
        .and_then(|t| t.render(&ctx))
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to render email subject: {}", e);
            title.to_string()
        });
    let body = env
        .get_template("notification_body")
        .and_then(|t| t.render(&ctx))
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to render email body: {}", e);
            message.to_string()
        });

    EmailMessage {
        to: to.to_string(),
        subject,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_link() {
        let email = render_notification_email(
            "ana@example.com",
            "Ana",
            "Issue assigned",
            "You were assigned \"Login fails\"",
            Some("http://localhost:3000/issues/1"),
        );
        assert_eq!(email.to, "ana@example.com");
        assert_eq!(email.subject, "[Feedback Tracker] Issue assigned");
        assert!(email.body.starts_with("Hello Ana,"));
        assert!(email.body.contains("View it here: http://localhost:3000/issues/1"));
    }

    #[test]
    fn test_render_without_link() {
        let email = render_notification_email("a@b.c", "A", "T", "M", None);
        assert!(!email.body.contains("View it here"));
    }
}
