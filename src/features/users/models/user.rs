use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

/// User role enum matching database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Client,
    Staff,
    Manager,
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 4] = [
        UserRole::Client,
        UserRole::Staff,
        UserRole::Manager,
        UserRole::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Client => "client",
            UserRole::Staff => "staff",
            UserRole::Manager => "manager",
            UserRole::Admin => "admin",
        }
    }

    /// Staff, manager and admin handle issues
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Staff | UserRole::Manager | UserRole::Admin)
    }

    pub fn is_manager(&self) -> bool {
        matches!(self, UserRole::Manager | UserRole::Admin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Invalid role '{}'. Allowed values: client, staff, manager, admin",
                    s
                )
            })
    }
}

/// Column list shared by every query that loads a full `User`
pub const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, \
    is_active, failed_login_attempts, locked_until, last_login_at, created_at, updated_at";

/// Database model for user
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

/// Data for inserting a new user
#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_role_hierarchy() {
        assert!(!UserRole::Client.is_staff());
        assert!(UserRole::Staff.is_staff());
        assert!(!UserRole::Staff.is_manager());
        assert!(UserRole::Manager.is_manager());
        assert!(!UserRole::Manager.is_admin());
        assert!(UserRole::Admin.is_staff() && UserRole::Admin.is_manager());
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("manager".parse::<UserRole>(), Ok(UserRole::Manager));
        assert!("superuser".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_lock_window() {
        let now = Utc::now();
        let mut user = User {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            password_hash: String::new(),
            first_name: "Ada".into(),
            last_name: String::new(),
            role: UserRole::Client,
            is_active: true,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        assert!(!user.is_locked(now));
        assert_eq!(user.full_name(), "Ada");

        user.locked_until = Some(now + Duration::minutes(5));
        assert!(user.is_locked(now));
        assert!(!user.is_locked(now + Duration::minutes(6)));
    }
}
