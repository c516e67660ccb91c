use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::users::dtos::{AdminUpdateUserDto, UpdateProfileDto, UserFilterQuery};
use crate::features::users::models::{NewUser, User, UserRole, USER_COLUMNS};
use crate::shared::types::PaginationQuery;

/// Convert a unique violation on the email index into a conflict
fn handle_db_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("23505") {
            return AppError::Conflict("Email is already registered".to_string());
        }
    }
    tracing::error!("User query failed: {:?}", e);
    AppError::Database(e)
}

/// Service for user accounts
pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_user: NewUser) -> Result<User> {
        let query = format!(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(Uuid::now_v7())
            .bind(new_user.email.trim().to_lowercase())
            .bind(&new_user.password_hash)
            .bind(new_user.first_name.trim())
            .bind(new_user.last_name.trim())
            .bind(new_user.role)
            .fetch_one(&self.pool)
            .await
            .map_err(handle_db_error)?;

        tracing::info!("User created: id={}, role={}", user.id, user.role);
        Ok(user)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<User> {
        Self::fetch_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    /// Lookup usable with a pool or an open transaction
    pub async fn fetch_by_id<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch user {}: {:?}", id, e);
                AppError::Database(e)
            })
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");
        sqlx::query_as::<_, User>(&query)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch user by email: {:?}", e);
                AppError::Database(e)
            })
    }

    /// List users with optional role/active/search filters
    pub async fn list(
        &self,
        filter: &UserFilterQuery,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<User>, i64)> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let where_clause = r#"
            WHERE ($1::user_role IS NULL OR role = $1)
              AND ($2::boolean IS NULL OR is_active = $2)
              AND ($3::text IS NULL OR email ILIKE $3 OR first_name ILIKE $3 OR last_name ILIKE $3)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users {where_clause}"))
            .bind(filter.role)
            .bind(filter.is_active)
            .bind(search.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to count users: {:?}", e);
                AppError::Database(e)
            })?;

        let query = format!(
            "SELECT {USER_COLUMNS} FROM users {where_clause} ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        );
        let users = sqlx::query_as::<_, User>(&query)
            .bind(filter.role)
            .bind(filter.is_active)
            .bind(search.as_deref())
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list users: {:?}", e);
                AppError::Database(e)
            })?;

        Ok((users, total))
    }

    /// Active users that may be assigned issues
    pub async fn list_assignable(&self) -> Result<Vec<User>> {
        let query = format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE is_active = TRUE AND role IN ('staff', 'manager', 'admin')
            ORDER BY first_name, last_name
            "#
        );
        sqlx::query_as::<_, User>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list assignable users: {:?}", e);
                AppError::Database(e)
            })
    }

    /// Ids of active users holding any of `roles`, used for notification fan-out
    pub async fn active_ids_with_roles(&self, roles: &[UserRole]) -> Result<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM users WHERE is_active = TRUE AND role::text = ANY($1) ORDER BY created_at",
        )
        .bind(roles.iter().map(|r| r.as_str().to_string()).collect::<Vec<_>>())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load users by role: {:?}", e);
            AppError::Database(e)
        })
    }

    pub async fn update_profile(&self, id: Uuid, dto: UpdateProfileDto) -> Result<User> {
        let query = format!(
            r#"
            UPDATE users
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(dto.first_name.as_deref().map(str::trim))
            .bind(dto.last_name.as_deref().map(str::trim))
            .fetch_optional(&self.pool)
            .await
            .map_err(handle_db_error)?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    pub async fn admin_update(
        &self,
        actor_id: Uuid,
        id: Uuid,
        dto: AdminUpdateUserDto,
    ) -> Result<User> {
        if actor_id == id && (dto.is_active == Some(false) || dto.role.is_some_and(|r| !r.is_admin()))
        {
            return Err(AppError::BadRequest(
                "Admins cannot demote or deactivate themselves".to_string(),
            ));
        }

        let query = format!(
            r#"
            UPDATE users
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                role = COALESCE($4, role),
                is_active = COALESCE($5, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(dto.first_name.as_deref().map(str::trim))
            .bind(dto.last_name.as_deref().map(str::trim))
            .bind(dto.role)
            .bind(dto.is_active)
            .fetch_optional(&self.pool)
            .await
            .map_err(handle_db_error)?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        tracing::info!(
            "User {} updated by admin {}: role={}, active={}",
            user.id,
            actor_id,
            user.role,
            user.is_active
        );
        Ok(user)
    }

    /// Soft delete: the row stays so issue history keeps its references
    pub async fn deactivate(&self, actor_id: Uuid, id: Uuid) -> Result<()> {
        if actor_id == id {
            return Err(AppError::BadRequest(
                "Admins cannot deactivate themselves".to_string(),
            ));
        }

        let result =
            sqlx::query("UPDATE users SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to deactivate user {}: {:?}", id, e);
                    AppError::Database(e)
                })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }

        // Outstanding refresh tokens die with the account
        sqlx::query(
            "UPDATE refresh_sessions SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to revoke sessions for user {}: {:?}", id, e);
            AppError::Database(e)
        })?;

        tracing::info!("User {} deactivated by {}", id, actor_id);
        Ok(())
    }

    pub async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update password for user {}: {:?}", id, e);
                AppError::Database(e)
            })?;
        Ok(())
    }

    /// Increments the failure counter and sets `locked_until` once `max_attempts` is reached
    pub async fn record_failed_login(
        &self,
        id: Uuid,
        max_attempts: i32,
        lock_until: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_attempts = failed_login_attempts + 1,
                locked_until = CASE
                    WHEN failed_login_attempts + 1 >= $2 THEN $3
                    ELSE locked_until
                END
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(max_attempts)
        .bind(lock_until)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to record failed login for {}: {:?}", id, e);
            AppError::Database(e)
        })?;
        Ok(())
    }

    pub async fn record_successful_login(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_attempts = 0, locked_until = NULL, last_login_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to record login for {}: {:?}", id, e);
            AppError::Database(e)
        })?;
        Ok(())
    }
}
