//! Role-based authorization guards.
//!
//! These guards extract the authenticated user and verify they have the required role.
//!
//! Role hierarchy (from highest to lowest):
//! - admin: user management, everything a manager can do
//! - manager: analytics for the whole team, deleting issues and feedback
//! - staff: triage, assignment, status transitions, reports
//! - client: submit and follow their own issues and feedback
//!
//! Each higher role includes all permissions of lower roles.

use crate::core::error::AppError;
use crate::features::auth::model::AuthenticatedUser;
use axum::{extract::FromRequestParts, http::request::Parts};

fn authenticated(parts: &Parts) -> Result<&AuthenticatedUser, AppError> {
    parts
        .extensions
        .get::<AuthenticatedUser>()
        .ok_or_else(|| AppError::Unauthorized("User not authenticated".to_string()))
}

/// Guard for staff level access (staff, manager or admin).
///
/// # Example
/// ```ignore
/// pub async fn handler(RequireStaff(user): RequireStaff) { ... }
/// ```
pub struct RequireStaff(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireStaff
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = authenticated(parts)?;
        if !user.is_staff() {
            return Err(AppError::Forbidden("Staff access required".to_string()));
        }
        Ok(RequireStaff(user.clone()))
    }
}

/// Guard for manager level access (manager or admin).
pub struct RequireManager(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireManager
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = authenticated(parts)?;
        if !user.is_manager() {
            return Err(AppError::Forbidden("Manager access required".to_string()));
        }
        Ok(RequireManager(user.clone()))
    }
}

/// Guard for admin only operations.
pub struct RequireAdmin(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = authenticated(parts)?;
        if !user.is_admin() {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(RequireAdmin(user.clone()))
    }
}

/// Caller identity on routes that also accept anonymous requests.
///
/// Populated by `optional_auth_middleware`; never rejects.
pub struct MaybeUser(pub Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<AuthenticatedUser>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::users::models::UserRole;
    use axum::http::Request;
    use uuid::Uuid;

    fn parts_with(role: Option<UserRole>) -> Parts {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        if let Some(role) = role {
            parts.extensions.insert(AuthenticatedUser {
                user_id: Uuid::new_v4(),
                email: "someone@example.com".to_string(),
                role,
            });
        }
        parts
    }

    #[tokio::test]
    async fn test_staff_guard() {
        let mut parts = parts_with(Some(UserRole::Client));
        let result = RequireStaff::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let mut parts = parts_with(Some(UserRole::Staff));
        assert!(RequireStaff::from_request_parts(&mut parts, &()).await.is_ok());
    }

    #[tokio::test]
    async fn test_manager_guard_rejects_staff() {
        let mut parts = parts_with(Some(UserRole::Staff));
        let result = RequireManager::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let mut parts = parts_with(Some(UserRole::Admin));
        assert!(RequireManager::from_request_parts(&mut parts, &()).await.is_ok());
    }

    #[tokio::test]
    async fn test_admin_guard() {
        let mut parts = parts_with(Some(UserRole::Manager));
        let result = RequireAdmin::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_missing_user_is_unauthorized() {
        let mut parts = parts_with(None);
        let result = RequireStaff::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));

        let MaybeUser(user) = MaybeUser::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(user.is_none());
    }
}
