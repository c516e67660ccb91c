use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::dtos::{
    AuthResponseDto, ChangePasswordRequestDto, LoginRequestDto, RefreshTokenRequestDto,
    RefreshTokenResponseDto, RegisterRequestDto,
};
use crate::features::auth::model::{AuthenticatedUser, RefreshSession};
use crate::features::auth::services::{hash_password, verify_password, TokenService};
use crate::features::users::dtos::UserResponseDto;
use crate::features::users::models::{NewUser, User, UserRole};
use crate::features::users::UserService;
use crate::shared::constants::{ACCOUNT_LOCK_MINUTES, MAX_FAILED_LOGIN_ATTEMPTS};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub struct AuthService {
    pool: PgPool,
    users: Arc<UserService>,
    tokens: Arc<TokenService>,
}

impl AuthService {
    pub fn new(pool: PgPool, users: Arc<UserService>, tokens: Arc<TokenService>) -> Self {
        Self {
            pool,
            users,
            tokens,
        }
    }

    /// Register a client account and sign it in
    pub async fn register(&self, dto: RegisterRequestDto) -> Result<AuthResponseDto> {
        if self.users.find_by_email(&dto.email).await?.is_some() {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        let password_hash = hash_password(dto.password).await?;
        let user = self
            .users
            .create(NewUser {
                email: dto.email,
                password_hash,
                first_name: dto.first_name,
                last_name: dto.last_name,
                role: UserRole::Client,
            })
            .await?;

        self.sign_in(user).await
    }

    pub async fn login(&self, dto: LoginRequestDto) -> Result<AuthResponseDto> {
        let user = self
            .users
            .find_by_email(&dto.email)
            .await?
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        if !user.is_active {
            return Err(AppError::Forbidden("Account is deactivated".to_string()));
        }

        let now = Utc::now();
        if user.is_locked(now) {
            return Err(AppError::Locked(
                "Too many failed login attempts. Try again later".to_string(),
            ));
        }

        if !verify_password(dto.password, user.password_hash.clone()).await? {
            self.users
                .record_failed_login(
                    user.id,
                    MAX_FAILED_LOGIN_ATTEMPTS,
                    now + Duration::minutes(ACCOUNT_LOCK_MINUTES),
                )
                .await?;
            tracing::warn!("Failed login for user {}", user.id);
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        self.users.record_successful_login(user.id).await?;
        tracing::info!("User {} logged in", user.id);
        self.sign_in(user).await
    }

    /// Exchange a refresh token for a new pair. The presented token is revoked;
    /// presenting an already revoked token revokes every session of its owner.
    pub async fn refresh_token(&self, dto: RefreshTokenRequestDto) -> Result<RefreshTokenResponseDto> {
        let token_hash = TokenService::hash_refresh_token(&dto.refresh_token);
        let mut tx = self.begin().await?;

        let session = sqlx::query_as::<_, RefreshSession>(
            r#"
            SELECT id, user_id, token_hash, expires_at, revoked_at, created_at
            FROM refresh_sessions
            WHERE token_hash = $1
            FOR UPDATE
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load refresh session: {:?}", e);
            AppError::Database(e)
        })?
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;

        if session.revoked_at.is_some() {
            tracing::warn!(
                "Revoked refresh token reused for user {}; revoking all sessions",
                session.user_id
            );
            Self::revoke_all_for_user(&mut tx, session.user_id).await?;
            self.commit(tx).await?;
            return Err(AppError::Unauthorized("Invalid refresh token".to_string()));
        }

        if session.is_expired(Utc::now()) {
            return Err(AppError::Unauthorized("Refresh token expired".to_string()));
        }

        let user = UserService::fetch_by_id(&mut *tx, session.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::Unauthorized("Account is not active".to_string()))?;

        sqlx::query("UPDATE refresh_sessions SET revoked_at = NOW() WHERE id = $1")
            .bind(session.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to revoke refresh session: {:?}", e);
                AppError::Database(e)
            })?;

        let refresh_token = self.store_refresh_token(&mut tx, user.id).await?;
        self.commit(tx).await?;

        let access = self.tokens.issue_access_token(&user)?;
        Ok(RefreshTokenResponseDto {
            access_token: access.token,
            token_type: "Bearer".to_string(),
            expires_in: access.expires_in,
            refresh_token,
        })
    }

    /// Revoke a refresh token. Unknown or already revoked tokens are accepted.
    pub async fn logout(&self, dto: RefreshTokenRequestDto) -> Result<()> {
        let token_hash = TokenService::hash_refresh_token(&dto.refresh_token);
        sqlx::query(
            "UPDATE refresh_sessions SET revoked_at = NOW() WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(token_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to revoke refresh token: {:?}", e);
            AppError::Database(e)
        })?;
        Ok(())
    }

    /// Change own password and sign out every other session
    pub async fn change_password(
        &self,
        auth: &AuthenticatedUser,
        dto: ChangePasswordRequestDto,
    ) -> Result<()> {
        let user = self.users.get_by_id(auth.user_id).await?;
        if !verify_password(dto.current_password, user.password_hash).await? {
            return Err(AppError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let new_hash = hash_password(dto.new_password).await?;
        self.users.set_password_hash(user.id, &new_hash).await?;

        let mut tx = self.begin().await?;
        Self::revoke_all_for_user(&mut tx, user.id).await?;
        self.commit(tx).await?;

        tracing::info!("Password changed for user {}", user.id);
        Ok(())
    }

    pub async fn get_current_user(&self, auth: &AuthenticatedUser) -> Result<UserResponseDto> {
        self.users.get_by_id(auth.user_id).await.map(Into::into)
    }

    async fn sign_in(&self, user: User) -> Result<AuthResponseDto> {
        let mut tx = self.begin().await?;
        let refresh_token = self.store_refresh_token(&mut tx, user.id).await?;
        self.commit(tx).await?;

        let access = self.tokens.issue_access_token(&user)?;
        Ok(AuthResponseDto {
            access_token: access.token,
            token_type: "Bearer".to_string(),
            expires_in: access.expires_in,
            refresh_token,
            user: user.into(),
        })
    }

    async fn store_refresh_token(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> Result<String> {
        let token = TokenService::generate_refresh_token();
        let expires_at = Utc::now() + Duration::seconds(self.tokens.refresh_ttl_secs());

        sqlx::query(
            r#"
            INSERT INTO refresh_sessions (id, user_id, token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(TokenService::hash_refresh_token(&token))
        .bind(expires_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store refresh session: {:?}", e);
            AppError::Database(e)
        })?;

        Ok(token)
    }

    async fn revoke_all_for_user(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE refresh_sessions SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to revoke sessions for user {}: {:?}", user_id, e);
            AppError::Database(e)
        })?;
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|e| {
            tracing::error!("Failed to start transaction: {:?}", e);
            AppError::Database(e)
        })
    }

    async fn commit(&self, tx: Transaction<'static, Postgres>) -> Result<()> {
        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit transaction: {:?}", e);
            AppError::Database(e)
        })
    }
}
