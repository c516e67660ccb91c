use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::features::users::models::{User, UserRole};
use crate::shared::validation::PERSON_NAME_REGEX;

/// Public view of a user (never exposes the password hash)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponseDto {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponseDto {
    fn from(u: User) -> Self {
        Self {
            full_name: u.full_name(),
            id: u.id,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            role: u.role,
            is_active: u.is_active,
            last_login_at: u.last_login_at,
            created_at: u.created_at,
        }
    }
}

/// Request DTO for updating own profile
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileDto {
    #[validate(
        length(min = 1, max = 150, message = "First name must be 1-150 characters"),
        regex(path = *PERSON_NAME_REGEX, message = "First name contains invalid characters")
    )]
    pub first_name: Option<String>,

    #[validate(
        length(min = 1, max = 150, message = "Last name must be 1-150 characters"),
        regex(path = *PERSON_NAME_REGEX, message = "Last name contains invalid characters")
    )]
    pub last_name: Option<String>,
}

/// Request DTO for admin user changes
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AdminUpdateUserDto {
    #[validate(length(min = 1, max = 150, message = "First name must be 1-150 characters"))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 150, message = "Last name must be 1-150 characters"))]
    pub last_name: Option<String>,

    pub role: Option<UserRole>,

    pub is_active: Option<bool>,
}

/// Filters for listing users
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserFilterQuery {
    /// Filter by role
    pub role: Option<UserRole>,
    /// Filter by active flag
    pub is_active: Option<bool>,
    /// Case-insensitive match on email, first or last name
    pub search: Option<String>,
}
