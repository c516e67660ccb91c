//! Outbound email.
//!
//! Notification emails are queued on a bounded channel and delivered by a
//! background task, so a slow or failing SMTP server never blocks a request.

mod mailer;
mod queue;
mod templates;

pub use mailer::{EmailError, EmailMessage, LogMailer, Mailer, SmtpMailer};
pub use queue::EmailQueue;
pub use templates::render_notification_email;
