mod notification;

pub use notification::{Notification, NotificationType, NOTIFICATION_COLUMNS};
