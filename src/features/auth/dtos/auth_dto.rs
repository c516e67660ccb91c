use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::features::users::dtos::UserResponseDto;
use crate::shared::validation::{validate_password_strength, PERSON_NAME_REGEX};

/// Request DTO for user registration. Self-registered accounts are always clients.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterRequestDto {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(custom(function = "validate_password_strength"))]
    pub password: String,

    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,

    #[validate(
        length(min = 1, max = 150, message = "First name must be 1-150 characters"),
        regex(path = *PERSON_NAME_REGEX, message = "First name contains invalid characters")
    )]
    pub first_name: String,

    #[validate(
        length(min = 1, max = 150, message = "Last name must be 1-150 characters"),
        regex(path = *PERSON_NAME_REGEX, message = "Last name contains invalid characters")
    )]
    pub last_name: String,
}

/// Request DTO for user login
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequestDto {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Request DTO for token refresh and logout
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RefreshTokenRequestDto {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Request DTO for changing own password
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequestDto {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(custom(function = "validate_password_strength"))]
    pub new_password: String,

    #[validate(must_match(other = "new_password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

/// Token pair returned by refresh. The refresh token is always rotated.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshTokenResponseDto {
    pub access_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Access token expiry time in seconds
    pub expires_in: i64,
    /// Replacement refresh token; the one sent is now revoked
    pub refresh_token: String,
}

/// Response DTO for authentication (register/login)
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponseDto {
    pub access_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Access token expiry time in seconds
    pub expires_in: i64,
    pub refresh_token: String,
    pub user: UserResponseDto,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(password: &str, confirm: &str) -> RegisterRequestDto {
        RegisterRequestDto {
            email: "new.client@example.com".to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
            first_name: "New".to_string(),
            last_name: "Client".to_string(),
        }
    }

    #[test]
    fn test_register_accepts_valid_payload() {
        assert!(register("Val1d!Pass", "Val1d!Pass").validate().is_ok());
    }

    #[test]
    fn test_register_rejects_mismatched_confirmation() {
        let errors = register("Val1d!Pass", "Val1d!Pazz").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("confirm_password"));
    }

    #[test]
    fn test_register_rejects_weak_password() {
        let errors = register("password", "password").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));
    }

    #[test]
    fn test_login_requires_email_format() {
        let dto = LoginRequestDto {
            email: "not-an-email".to_string(),
            password: "x".to_string(),
        };
        assert!(dto.validate().is_err());
    }
}
